//! Turns plain-text, tabular and markup files into a single text string.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use scraper::{ElementRef, Html};
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::utils::file_extension;

/// Bytes inspected when guessing a BOM-less UTF-16 encoding.
const UTF16_SNIFF_LEN: usize = 8192;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "meta", "link", "noscript", "template"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// Closed set of input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Tabular,
    Markup,
}

impl DocumentFormat {
    /// Infer the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let ext = file_extension(path);
        ext.trim_start_matches('.')
            .parse()
            .map_err(|_| ExtractError::UnsupportedFormat(ext))
    }
}

impl FromStr for DocumentFormat {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "txt" | "text" | "plain" => Ok(DocumentFormat::PlainText),
            "csv" | "tabular" => Ok(DocumentFormat::Tabular),
            "html" | "htm" | "markup" => Ok(DocumentFormat::Markup),
            other => Err(ExtractError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::PlainText => write!(f, "text"),
            DocumentFormat::Tabular => write!(f, "tabular"),
            DocumentFormat::Markup => write!(f, "markup"),
        }
    }
}

/// Read `path` and extract its text according to `format`.
pub fn extract(path: &Path, format: DocumentFormat) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path).map_err(|source| ExtractError::ReadError {
        path: path.display().to_string(),
        source,
    })?;
    extract_bytes(&path.display().to_string(), &bytes, format)
}

/// Extract text from in-memory file content. `name` is only used in errors.
pub fn extract_bytes(name: &str, bytes: &[u8], format: DocumentFormat) -> Result<String, ExtractError> {
    let text = decode_text(name, bytes);

    let extracted = match format {
        DocumentFormat::PlainText => text,
        DocumentFormat::Tabular => match render_table(&text) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!("structured CSV read failed for {}: {}; using raw text", name, e);
                text
            }
        },
        DocumentFormat::Markup => render_markup(&text),
    };

    debug!("extracted {} characters from {} ({})", extracted.chars().count(), name, format);
    Ok(extracted)
}

/// Decode bytes with BOM sniffing, then a UTF-16 guess, then UTF-8, then a
/// detected legacy encoding. Malformed sequences become U+FFFD; decoding
/// never fails.
fn decode_text(name: &str, bytes: &[u8]) -> String {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text.into_owned();
    }

    if let Some(encoding) = guess_utf16(&bytes[..bytes.len().min(UTF16_SNIFF_LEN)]) {
        debug!("treating {} as {} without BOM", name, encoding.name());
        let (text, _) = encoding.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    debug!("detected encoding {} for {}", encoding.name(), name);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// UTF-16 text in a Latin script puts a NUL in every other byte. A NUL in at
/// least half of the pairs on one side and almost none on the other is taken
/// as UTF-16 of that byte order.
fn guess_utf16(head: &[u8]) -> Option<&'static Encoding> {
    let pairs = head.len() / 2;
    if pairs == 0 {
        return None;
    }

    let (mut even, mut odd) = (0, 0);
    for pair in head.chunks_exact(2) {
        even += usize::from(pair[0] == 0);
        odd += usize::from(pair[1] == 0);
    }

    let dominant = |hits: usize, other: usize| pairs >= 2 && hits * 2 >= pairs && other * 20 <= pairs;
    if dominant(odd, even) {
        Some(encoding_rs::UTF_16LE)
    } else if dominant(even, odd) {
        Some(encoding_rs::UTF_16BE)
    } else {
        None
    }
}

/// One header line, then one `column: value` line per row.
fn render_table(text: &str) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Ok(String::new());
    }

    let mut lines = vec![format!("=== Headers ===\n{}\n", headers.join(" | "))];

    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let fields: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, value)| match headers.get(i) {
                Some(column) => format!("{}: {}", column, value.trim()),
                None => format!("column_{}: {}", i + 1, value.trim()),
            })
            .collect();
        lines.push(format!("Row {}: {}", idx + 1, fields.join(" | ")));
    }

    Ok(lines.join("\n"))
}

/// Visible text of an HTML document with block elements on their own lines.
fn render_markup(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0;
    for line in raw.lines().map(str::trim) {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 || out.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }

    let block = BLOCK_ELEMENTS.contains(&name);
    if block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, out);
        }
    }

    if block {
        out.push('\n');
    }
}
