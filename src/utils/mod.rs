//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{collect_files, file_extension, source_name, validate_file, write_atomic};
pub use retry::{RetryPolicy, Retryable};
pub use text::{clean_text, truncate_with_ellipsis};
