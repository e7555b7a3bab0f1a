pub mod backend;
pub mod canvas;
pub mod caption;
pub mod element;
pub mod loader;
pub mod sizing;
pub mod text;

pub use backend::Backend;
pub use canvas::CanvasSurface;
pub use element::{ElementState, ElementSurface};
pub use loader::{FsLoader, ImageLoader, MemoryLoader, decode_pixmap};
pub use sizing::{canvas_size, displayed_size, element_size};
pub use ab_glyph::FontVec;
pub use text::load_font;
