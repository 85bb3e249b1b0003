//! Source documents and their content keys.

use std::fmt;
use std::sync::Arc;

/// Hash of a document's raw source text.
///
/// Two submissions with the same key are the same document as far as the
/// render pipeline is concerned.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey(blake3::Hash);

impl ContentKey {
    pub fn of(source: &str) -> Self {
        Self(blake3::hash(source.as_bytes()))
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first 12 hex digits are plenty to tell documents apart in logs
        write!(f, "ContentKey({})", &self.to_hex()[..12])
    }
}

/// Raw vector source plus its content key.
///
/// Cheap to clone; the text is shared with the background render task.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    key: ContentKey,
    text: Arc<str>,
}

impl SourceDocument {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        Self {
            key: ContentKey::of(&text),
            text,
        }
    }

    pub fn key(&self) -> ContentKey {
        self.key
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text, for moving into another thread.
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}
