use docrag::models::{Message, Role};
use docrag::ConversationStore;
use tempfile::TempDir;

#[test]
fn test_conversation_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::open(dir.path()).unwrap();
    let id = store.new_id();

    let first = store
        .save(&id, &[Message::user("What is the notice period?")], None)
        .unwrap();
    assert_eq!(first.title, "What is the notice period?");
    assert_eq!(first.message_count, 1);

    let messages = vec![
        Message::user("What is the notice period?"),
        Message::assistant("Three months.", vec!["contract.txt".to_string()]),
    ];
    let second = store.save(&id, &messages, None).unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.message_count, 2);

    let loaded = store.load(&id).unwrap().unwrap();
    assert_eq!(loaded.messages.len(), 2);
    assert_eq!(loaded.messages[1].role, Role::Assistant);
    assert_eq!(loaded.messages[1].sources, vec!["contract.txt"]);

    let list = store.list().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].id, id);
    assert_eq!(list[0].message_count, 2);

    assert!(store.delete(&id).unwrap());
    assert!(store.load(&id).unwrap().is_none());
    assert!(store.list().unwrap().is_empty());
}

#[test]
fn test_ids_stay_unique_within_one_second() {
    let dir = TempDir::new().unwrap();
    let store = ConversationStore::open(dir.path()).unwrap();

    let ids: Vec<String> = (0..5).map(|_| store.new_id()).collect();
    for id in &ids {
        store.save(id, &[Message::user("hi")], None).unwrap();
    }

    let mut unique = ids.clone();
    unique.dedup();
    assert_eq!(unique.len(), 5);
    assert_eq!(store.list().unwrap().len(), 5);
}
