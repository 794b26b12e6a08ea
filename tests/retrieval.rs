use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docrag::models::{Config, IndexStatus, VectorDriver};
use docrag::services::{HashEmbedder, IngestOutcome, Retriever, TextChunker};
use docrag::ChunkMetadata;
use tempfile::TempDir;

const DIMENSION: usize = 384;

fn config(data_dir: &Path, driver: VectorDriver) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = data_dir.to_path_buf();
    config.vector_store.driver = driver;
    config.embedding.dimension = DIMENSION as u32;
    config
}

fn open(config: &Config) -> Retriever {
    Retriever::open(config, Arc::new(HashEmbedder::new(DIMENSION)))
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

async fn hello_goodbye_scenario(driver: VectorDriver) {
    let data = TempDir::new().unwrap();
    let docs = TempDir::new().unwrap();
    let retriever = open(&config(data.path(), driver));

    let a = write(docs.path(), "a.txt", "Hello world");
    let b = write(docs.path(), "b.txt", "Goodbye world");
    assert_eq!(retriever.ingest_file(&a).await.unwrap(), 1);
    assert_eq!(retriever.ingest_file(&b).await.unwrap(), 1);

    let hits = retriever.search("Hello", Some(1)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source(), "a.txt");
    assert_eq!(hits[0].text, "Hello world");

    assert_eq!(retriever.sources().await.unwrap(), vec!["a.txt", "b.txt"]);

    assert!(retriever.delete_source("a.txt").await.unwrap());
    assert!(!retriever.delete_source("a.txt").await.unwrap());
    assert_eq!(retriever.sources().await.unwrap(), vec!["b.txt"]);
    assert_eq!(retriever.count().await.unwrap(), 1);

    let hits = retriever.search("Hello", Some(5)).await.unwrap();
    assert!(hits.iter().all(|c| c.source() == "b.txt"));
}

#[tokio::test]
async fn test_flat_add_search_delete() {
    hello_goodbye_scenario(VectorDriver::Flat).await;
}

#[tokio::test]
async fn test_sqlite_add_search_delete() {
    hello_goodbye_scenario(VectorDriver::Sqlite).await;
}

async fn reload_scenario(driver: VectorDriver) {
    let data = TempDir::new().unwrap();
    let docs = TempDir::new().unwrap();
    let config = config(data.path(), driver);

    let (before_count, before_sources, before_order) = {
        let retriever = open(&config);
        for (name, text) in [
            ("leave.txt", "Annual leave is twenty five days per year."),
            ("notice.txt", "The notice period is three months for managers."),
            ("pay.txt", "Salary is paid on the last working day of the month."),
        ] {
            let path = write(docs.path(), name, text);
            retriever.ingest_file(&path).await.unwrap();
        }
        retriever.persist().await.unwrap();

        let order: Vec<String> = retriever
            .search("notice period months", Some(3))
            .await
            .unwrap()
            .iter()
            .map(|c| c.source().to_string())
            .collect();
        (
            retriever.count().await.unwrap(),
            retriever.sources().await.unwrap(),
            order,
        )
    };

    let reopened = open(&config);
    assert_eq!(reopened.count().await.unwrap(), before_count);
    assert_eq!(reopened.sources().await.unwrap(), before_sources);

    let order: Vec<String> = reopened
        .search("notice period months", Some(3))
        .await
        .unwrap()
        .iter()
        .map(|c| c.source().to_string())
        .collect();
    assert_eq!(order, before_order);
    assert_eq!(order[0], "notice.txt");
}

#[tokio::test]
async fn test_flat_survives_reload() {
    reload_scenario(VectorDriver::Flat).await;
}

#[tokio::test]
async fn test_sqlite_survives_reload() {
    reload_scenario(VectorDriver::Sqlite).await;
}

#[tokio::test]
async fn test_deleting_last_source_empties_the_index() {
    for driver in [VectorDriver::Flat, VectorDriver::Sqlite] {
        let data = TempDir::new().unwrap();
        let docs = TempDir::new().unwrap();
        let config = config(data.path(), driver);
        let retriever = open(&config);

        let only = write(docs.path(), "only.txt", "A single lonely document.");
        retriever.ingest_file(&only).await.unwrap();
        assert!(retriever.delete_source("only.txt").await.unwrap());

        let stats = retriever.stats().await.unwrap();
        assert_eq!(stats.status, IndexStatus::Empty);
        assert_eq!(stats.total_chunks, 0);
        assert!(retriever.search("lonely", None).await.unwrap().is_empty());

        let reopened = open(&config);
        assert_eq!(reopened.count().await.unwrap(), 0, "driver {driver}");
    }
}

#[tokio::test]
async fn test_batch_ingest_reports_each_file() {
    let data = TempDir::new().unwrap();
    let docs = TempDir::new().unwrap();
    let retriever = open(&config(data.path(), VectorDriver::Flat));

    let table = write(
        docs.path(),
        "staff.csv",
        "name,role\nAlice,Engineer\nBob,Manager\n",
    );
    let page = write(
        docs.path(),
        "policy.html",
        "<html><head><script>var hidden = 1;</script></head>\
         <body><h1>Remote work</h1><p>Employees may work remotely two days a week.</p></body></html>",
    );
    let empty = write(docs.path(), "empty.txt", "   \n\n  ");
    let missing = docs.path().join("missing.txt");
    let unsupported = write(docs.path(), "notes.md", "# heading");

    let report = retriever
        .ingest_files(&[table, page, empty, missing, unsupported])
        .await;

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.indexed_files(), 2);
    assert_eq!(report.failures().count(), 2);
    assert!(matches!(
        &report.outcomes[2],
        IngestOutcome::Skipped { source, .. } if source == "empty.txt"
    ));

    let chunks = retriever.chunks().await.unwrap();
    let csv = chunks.iter().find(|c| c.source() == "staff.csv").unwrap();
    assert!(csv.text.starts_with("=== Headers ===\nname | role"));
    assert!(csv.text.contains("Row 1: name: Alice | role: Engineer"));
    assert_eq!(csv.metadata.extension, ".csv");

    let html = chunks.iter().find(|c| c.source() == "policy.html").unwrap();
    assert!(html.text.contains("Remote work"));
    assert!(html.text.contains("Employees may work remotely"));
    assert!(!html.text.contains("hidden"));

    let hits = retriever.search("remote work", Some(1)).await.unwrap();
    assert_eq!(hits[0].source(), "policy.html");
}

#[tokio::test]
async fn test_scores_are_ordered() {
    let data = TempDir::new().unwrap();
    let docs = TempDir::new().unwrap();
    let retriever = open(&config(data.path(), VectorDriver::Sqlite));

    for (name, text) in [
        ("one.txt", "apples and pears"),
        ("two.txt", "apples only"),
        ("three.txt", "bananas"),
    ] {
        let path = write(docs.path(), name, text);
        retriever.ingest_file(&path).await.unwrap();
    }

    let scored = retriever.search_with_scores("apples", None).await.unwrap();
    assert_eq!(scored.len(), 3);
    assert!(scored.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(scored[0].chunk.source(), "two.txt");
}

#[test]
fn test_chunking_empty_text_yields_nothing() {
    let chunker = TextChunker::default();
    assert!(chunker.chunk("", &ChunkMetadata::for_source("x.txt")).is_empty());
}

#[test]
fn test_chunk_metadata_is_complete() {
    let chunker = TextChunker::with_sizes(100, 20);
    let text = "Sentence number one is here. ".repeat(20);
    let chunks = chunker.chunk(&text, &ChunkMetadata::for_source("long.txt"));

    assert!(chunks.len() > 1);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.source, "long.txt");
        assert_eq!(chunk.metadata.chunk_index as usize, i);
        assert_eq!(chunk.metadata.total_chunks as usize, chunks.len());
        assert!(chunk.text.chars().count() <= 100);
    }
}
