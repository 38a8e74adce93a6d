use crate::error::InferenceError;
use std::fmt;
use std::str::FromStr;

/// Serialization formats understood on both sides of `/invocations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Json,
    JsonLines,
    Csv,
}

impl ContentType {
    pub const DEFAULT: ContentType = ContentType::Json;

    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::JsonLines => "application/jsonlines",
            ContentType::Csv => "text/csv",
        }
    }

    /// Picks the output format for an `Accept`-style value.
    ///
    /// Entries are tried in order and the first supported one wins. Wildcards
    /// and a missing value select [`ContentType::DEFAULT`]. Returns `None` when
    /// the value names only unsupported formats, so the caller can report the
    /// fallback.
    pub fn negotiate(accept: Option<&str>) -> Option<ContentType> {
        let accept = match accept.map(str::trim) {
            None | Some("") => return Some(Self::DEFAULT),
            Some(value) => value,
        };

        for entry in accept.split(',') {
            let essence = essence(entry);
            if essence == "*/*" || essence == "application/*" {
                return Some(Self::DEFAULT);
            }
            if let Ok(content_type) = essence.parse() {
                return Some(content_type);
            }
        }
        None
    }
}

/// Media type without parameters, lowercased.
fn essence(raw: &str) -> String {
    raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase()
}

impl FromStr for ContentType {
    type Err = InferenceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match essence(raw).as_str() {
            "application/json" => Ok(ContentType::Json),
            "application/jsonlines" | "application/x-jsonlines" | "application/jsonl" => {
                Ok(ContentType::JsonLines)
            }
            "text/csv" => Ok(ContentType::Csv),
            "" => Err(InferenceError::UnsupportedContentType("<missing>".to_string())),
            _ => Err(InferenceError::UnsupportedContentType(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}
