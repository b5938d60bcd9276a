//! Pick a renderable representation out of an inspect_reply MIME bundle.

use std::sync::Arc;

use jupyter_protocol::Media;
use serde_json::Value;

/// Richest-first ordering used when no ranking is configured.
pub const DEFAULT_MIME_RANKING: &[&str] = &[
    "text/html",
    "text/markdown",
    "text/latex",
    "image/svg+xml",
    "image/png",
    "image/jpeg",
    "text/plain",
];

/// Displayable content produced from one reply.
///
/// The panel treats it as opaque; identity is the `Arc` that wraps it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedContent {
    pub mime_type: String,
    pub data: Value,
}

impl RenderedContent {
    /// The payload as text, when it is a string (every text/* type is).
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct RenderMime {
    ranking: Vec<String>,
}

impl Default for RenderMime {
    fn default() -> Self {
        Self::new(DEFAULT_MIME_RANKING.iter().map(|s| s.to_string()).collect())
    }
}

impl RenderMime {
    pub fn new(ranking: Vec<String>) -> Self {
        Self { ranking }
    }

    /// Move `mime_type` to the front of the ranking.
    pub fn prefer(mut self, mime_type: &str) -> Self {
        self.ranking.retain(|m| m != mime_type);
        self.ranking.insert(0, mime_type.to_string());
        self
    }

    pub fn ranking(&self) -> &[String] {
        &self.ranking
    }

    /// The highest ranked MIME type present in `bundle`, if any.
    pub fn preferred_mime_type(&self, bundle: &serde_json::Map<String, Value>) -> Option<&str> {
        self.ranking
            .iter()
            .find(|mime| bundle.get(mime.as_str()).is_some_and(|v| !v.is_null()))
            .map(|mime| mime.as_str())
    }

    /// The reply's MIME bundle as JSON (`{"text/plain": "...", ...}`).
    pub fn bundle(media: &Media) -> serde_json::Map<String, Value> {
        match serde_json::to_value(media) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Render the preferred representation of `bundle`.
    pub fn render(&self, bundle: &serde_json::Map<String, Value>) -> Option<Arc<RenderedContent>> {
        let mime_type = self.preferred_mime_type(bundle)?;
        let data = bundle.get(mime_type)?.clone();
        Some(Arc::new(RenderedContent {
            mime_type: mime_type.to_string(),
            data,
        }))
    }
}
