use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{
    Conversation, ConversationSummary, IndexStats, IndexStatus, OutputFormat, SearchResults,
};
use crate::services::{IngestOutcome, IngestReport};
use crate::utils::truncate_with_ellipsis;

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_search_results(&self, results: &SearchResults, show_scores: bool) -> String;
    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String;
    fn format_index_stats(&self, stats: &IndexStats) -> String;
    fn format_sources(&self, sources: &[String]) -> String;
    fn format_conversations(&self, conversations: &[ConversationSummary]) -> String;
    fn format_conversation(&self, conversation: &Conversation) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

fn status_label(status: IndexStatus) -> &'static str {
    match status {
        IndexStatus::Empty => "empty",
        IndexStatus::Ready => "ready",
    }
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_search_results(&self, results: &SearchResults, show_scores: bool) -> String {
        if results.is_empty() {
            return format!("No results found for: {}\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "Search results for: \"{}\"", results.query).unwrap();
        writeln!(
            output,
            "Found {} results in {}ms\n",
            results.len(),
            results.duration_ms
        )
        .unwrap();

        for (i, hit) in results.results.iter().enumerate() {
            let metadata = &hit.chunk.metadata;
            if show_scores {
                writeln!(output, "{}. [Distance: {:.4}]", i + 1, hit.distance).unwrap();
            } else {
                writeln!(output, "{}.", i + 1).unwrap();
            }
            writeln!(
                output,
                "   Source: {} (chunk {}/{})",
                metadata.source,
                metadata.chunk_index + 1,
                metadata.total_chunks
            )
            .unwrap();
            writeln!(output, "   ---").unwrap();

            let preview = truncate_with_ellipsis(&hit.chunk.text, PREVIEW_CHARS);
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String {
        let mut output = String::new();
        writeln!(output, "Indexing Complete").unwrap();
        writeln!(output, "-----------------").unwrap();

        for outcome in &report.outcomes {
            match outcome {
                IngestOutcome::Indexed { source, chunks } => {
                    writeln!(output, "  ✓ {} ({} chunks)", source, chunks).unwrap();
                }
                IngestOutcome::Skipped { source, reason } => {
                    writeln!(output, "  - {} skipped: {}", source, reason).unwrap();
                }
                IngestOutcome::Failed { source, reason } => {
                    writeln!(output, "  ✗ {}: {}", source, reason).unwrap();
                }
            }
        }

        writeln!(output).unwrap();
        writeln!(output, "Files indexed:  {}", report.indexed_files()).unwrap();
        writeln!(output, "Files failed:   {}", report.failures().count()).unwrap();
        writeln!(output, "Chunks created: {}", report.total_chunks()).unwrap();
        writeln!(output, "Duration:       {}ms", duration_ms).unwrap();
        output
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Index:      [{}]", status_label(stats.status).to_uppercase()).unwrap();
        writeln!(output, "Backend:    {}", stats.backend).unwrap();
        writeln!(output, "Embedding:  {}", stats.embedding_model).unwrap();
        writeln!(output, "Top-K:      {}", stats.top_k).unwrap();
        writeln!(output, "Chunks:     {}", stats.total_chunks).unwrap();
        writeln!(output, "Sources:    {}", stats.total_sources).unwrap();
        for source in &stats.sources {
            writeln!(output, "  - {}", source).unwrap();
        }
        output
    }

    fn format_sources(&self, sources: &[String]) -> String {
        if sources.is_empty() {
            return "No indexed sources.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Indexed Sources").unwrap();
        writeln!(output, "---------------").unwrap();
        for source in sources {
            writeln!(output, "  {}", source).unwrap();
        }
        output
    }

    fn format_conversations(&self, conversations: &[ConversationSummary]) -> String {
        if conversations.is_empty() {
            return "No saved conversations.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Conversations").unwrap();
        writeln!(output, "-------------").unwrap();
        for conv in conversations {
            writeln!(output, "{}  {}", conv.id, conv.title).unwrap();
            writeln!(
                output,
                "  {} messages, updated {}",
                conv.message_count, conv.updated_at
            )
            .unwrap();
        }
        output
    }

    fn format_conversation(&self, conversation: &Conversation) -> String {
        let mut output = String::new();
        writeln!(output, "{}", conversation.title).unwrap();
        writeln!(
            output,
            "{} | created {} | updated {}\n",
            conversation.id, conversation.created_at, conversation.updated_at
        )
        .unwrap();

        for message in &conversation.messages {
            if message.timestamp.is_empty() {
                writeln!(output, "[{}]", message.role).unwrap();
            } else {
                writeln!(output, "[{}] {}", message.role, message.timestamp).unwrap();
            }
            for line in message.content.lines() {
                writeln!(output, "  {}", line).unwrap();
            }
            if !message.sources.is_empty() {
                writeln!(output, "  Sources: {}", message.sources.join(", ")).unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let mut out = rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string());
        out.push('\n');
        out
    }
}

impl Formatter for JsonFormatter {
    fn format_search_results(&self, results: &SearchResults, _show_scores: bool) -> String {
        self.render(results)
    }

    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String {
        self.render(&serde_json::json!({
            "files": report.outcomes,
            "files_indexed": report.indexed_files(),
            "files_failed": report.failures().count(),
            "chunks_created": report.total_chunks(),
            "duration_ms": duration_ms,
        }))
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        self.render(stats)
    }

    fn format_sources(&self, sources: &[String]) -> String {
        self.render(&serde_json::json!({ "sources": sources }))
    }

    fn format_conversations(&self, conversations: &[ConversationSummary]) -> String {
        self.render(&serde_json::json!({ "conversations": conversations }))
    }

    fn format_conversation(&self, conversation: &Conversation) -> String {
        self.render(conversation)
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", serde_json::json!({"message": message}))
    }

    fn format_error(&self, error: &str) -> String {
        format!("{}\n", serde_json::json!({"error": error}))
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_search_results(&self, results: &SearchResults, show_scores: bool) -> String {
        if results.is_empty() {
            return format!("## No results found\n\nQuery: `{}`\n", results.query);
        }

        let mut output = String::new();
        writeln!(output, "## Search Results\n").unwrap();
        writeln!(output, "**Query:** `{}`\n", results.query).unwrap();

        for (i, hit) in results.results.iter().enumerate() {
            if show_scores {
                writeln!(output, "### {}. Distance: {:.4}\n", i + 1, hit.distance).unwrap();
            } else {
                writeln!(output, "### {}.\n", i + 1).unwrap();
            }
            writeln!(output, "**Source:** `{}`\n", hit.chunk.metadata.source).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", hit.chunk.text).unwrap();
            writeln!(output, "```\n").unwrap();
        }

        output
    }

    fn format_ingest_report(&self, report: &IngestReport, duration_ms: u64) -> String {
        let mut output = String::new();
        writeln!(output, "## Indexing Complete\n").unwrap();
        writeln!(output, "| File | Result |").unwrap();
        writeln!(output, "|------|--------|").unwrap();
        for outcome in &report.outcomes {
            let result = match outcome {
                IngestOutcome::Indexed { chunks, .. } => format!("✅ {} chunks", chunks),
                IngestOutcome::Skipped { reason, .. } => format!("⏭️ {}", reason),
                IngestOutcome::Failed { reason, .. } => format!("❌ {}", reason),
            };
            writeln!(output, "| `{}` | {} |", outcome.source(), result).unwrap();
        }
        writeln!(output, "\n**Duration:** {}ms", duration_ms).unwrap();
        output
    }

    fn format_index_stats(&self, stats: &IndexStats) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Index | {} |", status_label(stats.status)).unwrap();
        writeln!(output, "| Backend | {} |", stats.backend).unwrap();
        writeln!(output, "| Embedding | {} |", stats.embedding_model).unwrap();
        writeln!(output, "| Top-K | {} |", stats.top_k).unwrap();
        writeln!(output, "| Chunks | {} |", stats.total_chunks).unwrap();
        writeln!(output, "| Sources | {} |", stats.total_sources).unwrap();
        output
    }

    fn format_sources(&self, sources: &[String]) -> String {
        if sources.is_empty() {
            return "## Sources\n\n*No indexed sources.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Sources\n").unwrap();
        for source in sources {
            writeln!(output, "- `{}`", source).unwrap();
        }
        output
    }

    fn format_conversations(&self, conversations: &[ConversationSummary]) -> String {
        if conversations.is_empty() {
            return "## Conversations\n\n*No saved conversations.*\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Conversations\n").unwrap();
        writeln!(output, "| Id | Title | Messages | Updated |").unwrap();
        writeln!(output, "|----|-------|----------|---------|").unwrap();
        for conv in conversations {
            writeln!(
                output,
                "| `{}` | {} | {} | {} |",
                conv.id, conv.title, conv.message_count, conv.updated_at
            )
            .unwrap();
        }
        output
    }

    fn format_conversation(&self, conversation: &Conversation) -> String {
        let mut output = String::new();
        writeln!(output, "## {}\n", conversation.title).unwrap();
        writeln!(output, "*Created {}*\n", conversation.created_at).unwrap();
        for message in &conversation.messages {
            writeln!(output, "**{}:** {}\n", message.role, message.content).unwrap();
            if !message.sources.is_empty() {
                let sources: Vec<String> = message.sources.iter().map(|s| format!("`{}`", s)).collect();
                writeln!(output, "Sources: {}\n", sources.join(", ")).unwrap();
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata, ScoredChunk};

    fn results() -> SearchResults {
        let mut metadata = ChunkMetadata::for_source("contract.txt");
        metadata.total_chunks = 3;
        SearchResults::new(
            "notice".to_string(),
            vec![ScoredChunk {
                chunk: Chunk::new("Notice period is 30 days.", metadata),
                distance: 0.125,
            }],
            4,
        )
    }

    #[test]
    fn test_text_search_results() {
        let out = TextFormatter.format_search_results(&results(), true);
        assert!(out.contains("Source: contract.txt (chunk 1/3)"));
        assert!(out.contains("[Distance: 0.1250]"));
        assert!(out.contains("Notice period is 30 days."));

        let out = TextFormatter.format_search_results(&results(), false);
        assert!(!out.contains("Distance"));
    }

    #[test]
    fn test_json_search_results_parse() {
        let out = JsonFormatter::new(false).format_search_results(&results(), false);
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["query"], "notice");
        assert_eq!(value["results"][0]["chunk"]["metadata"]["source"], "contract.txt");
    }

    #[test]
    fn test_ingest_report_text() {
        let report = IngestReport {
            outcomes: vec![
                IngestOutcome::Indexed {
                    source: "a.txt".to_string(),
                    chunks: 2,
                },
                IngestOutcome::Failed {
                    source: "b.pdf".to_string(),
                    reason: "unsupported format: .pdf".to_string(),
                },
            ],
        };
        let out = TextFormatter.format_ingest_report(&report, 12);
        assert!(out.contains("✓ a.txt (2 chunks)"));
        assert!(out.contains("✗ b.pdf: unsupported format: .pdf"));
        assert!(out.contains("Chunks created: 2"));

        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter::new(true).format_ingest_report(&report, 12)).unwrap();
        assert_eq!(json["files"][1]["status"], "failed");
        assert_eq!(json["files_failed"], 1);
    }

    #[test]
    fn test_empty_listings() {
        assert_eq!(TextFormatter.format_sources(&[]), "No indexed sources.\n");
        assert_eq!(TextFormatter.format_conversations(&[]), "No saved conversations.\n");
    }
}
