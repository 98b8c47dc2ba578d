//! Upload validation and text extraction policy.
//!
//! Only plain text is extracted in-process. Other supported formats are
//! represented by a placeholder until a server-side extractor fills in the
//! real text; [`is_placeholder`] lets ingestion refuse to embed it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

const ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];
const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("File size must be less than 50MB (got {size} bytes)")]
    TooLarge { size: u64 },

    #[error("File must be PDF, DOCX, or TXT format (got '{0}')")]
    UnsupportedType(String),

    #[error("Text file is not valid UTF-8")]
    InvalidUtf8,
}

pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Text pulled out of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extracted {
    pub text: String,
    /// Set when `text` is degraded or a stand-in for the real content
    pub warning: Option<String>,
    pub language: String,
    pub word_count: usize,
}

impl Extracted {
    fn new(text: String, warning: Option<String>) -> Self {
        Self {
            language: detect_language(&text).to_string(),
            word_count: text.split_whitespace().count(),
            text,
            warning,
        }
    }
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, file_name: &str, bytes: &[u8], declared_type: &str) -> Result<Extracted>;
}

/// Reads `.txt` uploads directly and stands in a placeholder for the rest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, file_name: &str, bytes: &[u8], declared_type: &str) -> Result<Extracted> {
        if is_plain_text(file_name, declared_type) {
            let text = std::str::from_utf8(bytes)
                .map_err(|_| ExtractionError::InvalidUtf8)?
                .trim_start_matches('\u{feff}')
                .to_string();
            return Ok(Extracted::new(text, None));
        }

        Ok(Extracted::new(
            format!("[File: {}] - Text will be extracted on server", file_name),
            Some(format!("{} was not extracted; placeholder text stored", file_name)),
        ))
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_plain_text(file_name: &str, declared_type: &str) -> bool {
    declared_type.eq_ignore_ascii_case("text/plain") || extension(file_name).as_deref() == Some("txt")
}

/// Checks an upload before anything is stored.
pub fn validate_upload(file_name: &str, declared_type: &str, size: u64) -> Result<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ExtractionError::TooLarge { size });
    }

    let type_ok = ALLOWED_TYPES.contains(&declared_type);
    let extension_ok = extension(file_name)
        .map(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or(false);

    if !type_ok && !extension_ok {
        return Err(ExtractionError::UnsupportedType(declared_type.to_string()));
    }

    Ok(())
}

/// Guesses the MIME type from the file extension.
pub fn declared_type_for(file_name: &str) -> &'static str {
    match extension(file_name).as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => ALLOWED_TYPES[1],
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn placeholder_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\[File: [^\]]*\] - Text will be extracted on server$",
            r"(?i)^\[[^\]]*(image|scanned|no extractable text|صورة)[^\]]*\]$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// True when `text` is a stand-in produced by an extractor rather than
/// document content.
pub fn is_placeholder(text: &str) -> bool {
    let text = text.trim();
    placeholder_patterns().iter().any(|re| re.is_match(text))
}

/// Returns `ar` when Arabic-script characters make up more than 30% of the
/// non-whitespace characters, `en` otherwise.
pub fn detect_language(text: &str) -> &'static str {
    let (arabic, total) = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .fold((0usize, 0usize), |(arabic, total), c| {
            let is_arabic = ('\u{0600}'..='\u{06FF}').contains(&c);
            (arabic + is_arabic as usize, total + 1)
        });

    if total > 0 && arabic as f64 / total as f64 > 0.3 {
        "ar"
    } else {
        "en"
    }
}
