use crate::stimulus::{ImageRef, Sizing};
use std::time::Duration;

/// Whether an image was fully decoded in time for its exposure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Decoded,
    /// Decoding failed or overran the surface's tolerance. Informational
    /// only: the frame still counts and its timing is unchanged.
    DecodeDegraded,
}

impl PresentOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PresentOutcome::DecodeDegraded)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub loaded: usize,
    pub failed: Vec<ImageRef>,
    /// The load budget ran out before every image was visited.
    pub timed_out: bool,
}

/// Display the trial engine draws into.
///
/// Implementations never fail outward: a broken image is reported through
/// [`PresentOutcome::DecodeDegraded`] and the call still completes.
pub trait Surface {
    /// Draw `image` with `caption` (HTML) below it, hiding the caption region
    /// when `caption` is `None`.
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome;

    /// Blank the image area, leaving the caption region's layout in place.
    fn clear(&mut self);

    /// Drop image and caption entirely, as between trials.
    fn reset(&mut self);

    /// Sizing hints for the images that follow.
    fn set_sizing(&mut self, sizing: Sizing) {
        let _ = sizing;
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        let _ = (images, budget);
        PreloadReport::default()
    }
}

impl<S: Surface + ?Sized> Surface for Box<S> {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        (**self).present(image, caption)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn set_sizing(&mut self, sizing: Sizing) {
        (**self).set_sizing(sizing)
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        (**self).preload(images, budget)
    }
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        (**self).present(image, caption)
    }

    fn clear(&mut self) {
        (**self).clear()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn set_sizing(&mut self, sizing: Sizing) {
        (**self).set_sizing(sizing)
    }

    fn preload(&mut self, images: &[ImageRef], budget: Duration) -> PreloadReport {
        (**self).preload(images, budget)
    }
}
