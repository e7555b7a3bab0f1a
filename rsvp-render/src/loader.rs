use anyhow::{Context, Result, anyhow, bail};
use bytemuck::cast_slice;
use rsvp_core::ImageRef;
use std::collections::HashMap;
use std::path::PathBuf;
use tiny_skia::{ColorU8, Pixmap};

/// Fetches the encoded bytes behind an image reference.
pub trait ImageLoader {
    fn load(&self, image: &ImageRef) -> Result<Vec<u8>>;
}

/// Resolves references as paths relative to `root`.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageLoader for FsLoader {
    fn load(&self, image: &ImageRef) -> Result<Vec<u8>> {
        let path = self.root.join(image.as_str());
        std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }
}

/// In-memory image table, for tests and simulation.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    images: HashMap<ImageRef, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, image: impl Into<ImageRef>, bytes: Vec<u8>) -> Self {
        self.insert(image, bytes);
        self
    }

    pub fn insert(&mut self, image: impl Into<ImageRef>, bytes: Vec<u8>) {
        self.images.insert(image.into(), bytes);
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, image: &ImageRef) -> Result<Vec<u8>> {
        match self.images.get(image) {
            Some(bytes) => Ok(bytes.clone()),
            None => bail!("no image registered for {image}"),
        }
    }
}

impl<L: ImageLoader + ?Sized> ImageLoader for &L {
    fn load(&self, image: &ImageRef) -> Result<Vec<u8>> {
        (**self).load(image)
    }
}

/// Decode any format `image` understands into a premultiplied pixmap.
pub fn decode_pixmap(bytes: &[u8]) -> Result<Pixmap> {
    let rgba = image::load_from_memory(bytes)
        .context("decoding image bytes")?
        .into_rgba8();
    let (w, h) = rgba.dimensions();
    let mut pm = Pixmap::new(w, h).ok_or_else(|| anyhow!("image has no pixels ({w}x{h})"))?;
    let src: &[[u8; 4]] = cast_slice(rgba.as_raw());
    for (dst, px) in pm.pixels_mut().iter_mut().zip(src) {
        *dst = ColorU8::from_rgba(px[0], px[1], px[2], px[3]).premultiply();
    }
    Ok(pm)
}
