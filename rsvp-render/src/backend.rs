use crate::canvas::CanvasSurface;
use crate::element::ElementSurface;
use crate::loader::ImageLoader;
use anyhow::Result;
use rsvp_core::{ImageRef, PreloadReport, PresentOutcome, RenderMode, Sizing, Surface};
use std::time::Duration;

/// Surface chosen once, from the rendering mode, when a session starts.
pub enum Backend<L> {
    Canvas(CanvasSurface<L>),
    Element(ElementSurface<L>),
}

impl<L: ImageLoader> Backend<L> {
    /// `viewport` sizes the offscreen canvas; the element backend keeps no
    /// pixels and ignores it.
    pub fn new(
        mode: RenderMode,
        loader: L,
        viewport: (u32, u32),
        decode_tolerance: Duration,
    ) -> Result<Self> {
        Ok(match mode {
            RenderMode::Canvas => Backend::Canvas(
                CanvasSurface::new(viewport.0, viewport.1, loader, Sizing::default())?
                    .with_decode_tolerance(decode_tolerance),
            ),
            RenderMode::Element => Backend::Element(ElementSurface::new(loader, Sizing::default())),
        })
    }

    pub fn mode(&self) -> RenderMode {
        match self {
            Backend::Canvas(_) => RenderMode::Canvas,
            Backend::Element(_) => RenderMode::Element,
        }
    }

    /// On-screen size of the image currently shown.
    pub fn displayed_size(&self) -> Option<(u32, u32)> {
        match self {
            Backend::Canvas(s) => s
                .image_rect()
                .map(|r| (r.width() as u32, r.height() as u32)),
            Backend::Element(s) => s.displayed_size(),
        }
    }
}

impl<L: ImageLoader> Surface for Backend<L> {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        match self {
            Backend::Canvas(s) => s.present(image, caption),
            Backend::Element(s) => s.present(image, caption),
        }
    }

    fn clear(&mut self) {
        match self {
            Backend::Canvas(s) => s.clear(),
            Backend::Element(s) => s.clear(),
        }
    }

    fn reset(&mut self) {
        match self {
            Backend::Canvas(s) => s.reset(),
            Backend::Element(s) => s.reset(),
        }
    }

    fn set_sizing(&mut self, sizing: Sizing) {
        match self {
            Backend::Canvas(s) => s.set_sizing(sizing),
            Backend::Element(s) => s.set_sizing(sizing),
        }
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        match self {
            Backend::Canvas(s) => s.preload(images, budget),
            Backend::Element(s) => s.preload(images, budget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::test_support::png;

    fn backend(mode: RenderMode) -> Backend<MemoryLoader> {
        let loader = MemoryLoader::new().with("wide.png", png(20, 10, [0, 255, 0, 255]));
        Backend::new(mode, loader, (200, 200), Duration::from_secs(5)).unwrap()
    }

    fn height_only() -> Sizing {
        Sizing {
            height: Some(50),
            width: None,
            maintain_aspect_ratio: false,
        }
    }

    #[test]
    fn mode_selects_the_variant() {
        assert!(matches!(backend(RenderMode::Canvas), Backend::Canvas(_)));
        assert!(matches!(backend(RenderMode::Element), Backend::Element(_)));
        assert_eq!(backend(RenderMode::Element).mode(), RenderMode::Element);
    }

    #[test]
    fn each_backend_sizes_by_its_own_policy() {
        let mut canvas = backend(RenderMode::Canvas);
        canvas.set_sizing(height_only());
        canvas.present(&ImageRef::from("wide.png"), None);
        assert_eq!(canvas.displayed_size(), Some((20, 50)));

        let mut element = backend(RenderMode::Element);
        element.set_sizing(height_only());
        element.present(&ImageRef::from("wide.png"), None);
        assert_eq!(element.displayed_size(), Some((100, 50)));
    }

    #[test]
    fn reset_drops_the_image() {
        let mut b = backend(RenderMode::Canvas);
        b.present(&ImageRef::from("wide.png"), Some("<p>x</p>"));
        b.reset();
        assert_eq!(b.displayed_size(), None);
    }
}
