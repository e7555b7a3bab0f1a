use crate::loader::ImageLoader;
use crate::sizing::element_size;
use log::warn;
use rsvp_core::{ImageRef, PreloadReport, PresentOutcome, Sizing, Surface};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Observable state of a plain image element and its caption block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementState {
    pub src: Option<ImageRef>,
    pub style_width: Option<u32>,
    pub style_height: Option<u32>,
    pub visible: bool,
    pub caption_html: String,
    pub caption_visible: bool,
}

/// Image-element surface: swaps the element's source and toggles its
/// visibility, leaving scaling to the element's style. No pixels are kept,
/// which also makes it the headless surface for simulation runs.
pub struct ElementSurface<L> {
    loader: L,
    sizing: Sizing,
    state: ElementState,
    natural: HashMap<usize, (u32, u32)>,
    undecodable: HashSet<usize>,
}

impl<L: ImageLoader> ElementSurface<L> {
    pub fn new(loader: L, sizing: Sizing) -> Self {
        Self {
            loader,
            sizing,
            state: ElementState::default(),
            natural: HashMap::new(),
            undecodable: HashSet::new(),
        }
    }

    pub fn state(&self) -> &ElementState {
        &self.state
    }

    /// On-screen size of the current image, if it decoded.
    pub fn displayed_size(&self) -> Option<(u32, u32)> {
        let src = self.state.src.as_ref()?;
        let natural = self.natural.get(&src.cache_id())?;
        Some(element_size(&self.sizing, *natural))
    }

    fn probe(&mut self, image: &ImageRef) -> PresentOutcome {
        let id = image.cache_id();
        if self.natural.contains_key(&id) {
            return PresentOutcome::Decoded;
        }
        if self.undecodable.contains(&id) {
            return PresentOutcome::DecodeDegraded;
        }
        let decoded = self
            .loader
            .load(image)
            .and_then(|bytes| Ok(image::load_from_memory(&bytes)?));
        match decoded {
            Ok(img) => {
                self.natural.insert(id, (img.width(), img.height()));
                PresentOutcome::Decoded
            }
            Err(e) => {
                warn!("decode failed for {image}: {e:#}");
                self.undecodable.insert(id);
                PresentOutcome::DecodeDegraded
            }
        }
    }
}

impl<L: ImageLoader> Surface for ElementSurface<L> {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        let outcome = self.probe(image);
        self.state.src = Some(image.clone());
        if self.sizing.height.is_some() {
            self.state.style_height = self.sizing.height;
        }
        if self.sizing.width.is_some() {
            self.state.style_width = self.sizing.width;
        }
        self.state.visible = true;
        self.state.caption_html = caption.unwrap_or_default().to_owned();
        self.state.caption_visible = caption.is_some_and(|c| !c.is_empty());
        outcome
    }

    fn clear(&mut self) {
        self.state.visible = false;
    }

    fn reset(&mut self) {
        self.state = ElementState::default();
    }

    fn set_sizing(&mut self, sizing: Sizing) {
        self.sizing = sizing;
        self.state.style_width = None;
        self.state.style_height = None;
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        let started = Instant::now();
        let mut report = PreloadReport::default();
        for image in images {
            if started.elapsed() > budget {
                report.timed_out = true;
                break;
            }
            match self.probe(image) {
                PresentOutcome::Decoded => report.loaded += 1,
                PresentOutcome::DecodeDegraded => report.failed.push(image.clone()),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MemoryLoader;
    use crate::test_support::png;

    fn surface(sizing: Sizing) -> ElementSurface<MemoryLoader> {
        let loader = MemoryLoader::new()
            .with("a.png", png(20, 10, [0, 255, 0, 255]))
            .with("bad.png", vec![0xde, 0xad]);
        ElementSurface::new(loader, sizing)
    }

    #[test]
    fn present_shows_image_with_styles_and_caption() {
        let mut s = surface(Sizing {
            height: Some(50),
            ..Sizing::default()
        });
        let out = s.present(&ImageRef::from("a.png"), Some("<p>hi</p>"));
        assert_eq!(out, PresentOutcome::Decoded);
        let st = s.state();
        assert_eq!(st.src, Some(ImageRef::from("a.png")));
        assert_eq!((st.style_width, st.style_height), (None, Some(50)));
        assert!(st.visible && st.caption_visible);
        assert_eq!(s.displayed_size(), Some((100, 50)));
    }

    #[test]
    fn clear_hides_image_and_keeps_caption() {
        let mut s = surface(Sizing::default());
        s.present(&ImageRef::from("a.png"), Some("x"));
        s.clear();
        assert!(!s.state().visible);
        assert!(s.state().caption_visible);
        s.present(&ImageRef::from("a.png"), None);
        assert!(!s.state().caption_visible);
        assert!(s.state().caption_html.is_empty());
    }

    #[test]
    fn undecodable_image_is_degraded_and_still_presented() {
        let mut s = surface(Sizing::default());
        assert!(s.present(&ImageRef::from("bad.png"), None).is_degraded());
        assert!(s.state().visible);
        assert_eq!(s.displayed_size(), None);
        assert_eq!(s.state().src, Some(ImageRef::from("bad.png")));
    }

    #[test]
    fn preload_counts_decodable_images() {
        let mut s = surface(Sizing::default());
        let report = s.preload(
            &[ImageRef::from("a.png"), ImageRef::from("bad.png")],
            Duration::from_secs(1),
        );
        assert_eq!(report.loaded, 1);
        assert_eq!(report.failed.len(), 1);
    }
}
