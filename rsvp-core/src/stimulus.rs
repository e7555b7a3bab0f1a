use rsvp_cache::intern_text;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to one image in a pool: a path or URL, opaque to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interned id, shared by every surface that caches decoded pixels.
    pub fn cache_id(&self) -> usize {
        intern_text(&self.0)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ImageRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which surface backend draws the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Canvas,
    Element,
}

impl RenderMode {
    pub fn from_canvas_flag(render_on_canvas: bool) -> Self {
        if render_on_canvas {
            RenderMode::Canvas
        } else {
            RenderMode::Element
        }
    }
}

/// Display size hints in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sizing {
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub maintain_aspect_ratio: bool,
}

impl Default for Sizing {
    fn default() -> Self {
        Self {
            height: None,
            width: None,
            maintain_aspect_ratio: true,
        }
    }
}
