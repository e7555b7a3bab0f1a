#![allow(dead_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use rsvp_core::{ImageRef, PresentOutcome, Surface};
use rsvp_experiment::{TrialParameters, TrialRunner};
use rsvp_timing::{ManualTimer, Timer};
use std::collections::HashSet;

pub const MS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Draw {
    Present {
        image: ImageRef,
        caption: Option<String>,
    },
    Clear,
    Reset,
}

/// Surface that logs every call with the virtual time it happened at.
pub struct RecordingSurface {
    timer: ManualTimer,
    pub draws: Vec<(u64, Draw)>,
    pub broken: HashSet<ImageRef>,
}

impl RecordingSurface {
    pub fn new(timer: ManualTimer) -> Self {
        Self {
            timer,
            draws: Vec::new(),
            broken: HashSet::new(),
        }
    }

    /// Stream frames only: presents without a caption.
    pub fn frames(&self) -> Vec<(u64, ImageRef)> {
        self.draws
            .iter()
            .filter_map(|(t, d)| match d {
                Draw::Present {
                    image,
                    caption: None,
                } => Some((*t, image.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn clears(&self) -> Vec<u64> {
        self.draws
            .iter()
            .filter(|(_, d)| *d == Draw::Clear)
            .map(|(t, _)| *t)
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
        self.draws.push((
            self.timer.now(),
            Draw::Present {
                image: image.clone(),
                caption: caption.map(str::to_owned),
            },
        ));
        if self.broken.contains(image) {
            PresentOutcome::DecodeDegraded
        } else {
            PresentOutcome::Decoded
        }
    }

    fn clear(&mut self) {
        self.draws.push((self.timer.now(), Draw::Clear));
    }

    fn reset(&mut self) {
        self.draws.push((self.timer.now(), Draw::Reset));
    }
}

pub type Runner = TrialRunner<RecordingSurface, ManualTimer, StdRng>;

pub fn runner(seed: u64) -> (Runner, ManualTimer) {
    let timer = ManualTimer::new();
    let surface = RecordingSurface::new(timer.clone());
    (
        TrialRunner::new(surface, timer.clone(), StdRng::seed_from_u64(seed)),
        timer,
    )
}

pub fn pool(n: usize) -> Vec<ImageRef> {
    (0..n).map(|i| ImageRef::new(format!("img/{i:02}.png"))).collect()
}

/// Ten images, five frames, 250 ms exposure, 50 ms blank, space to respond.
pub fn rsvp_params() -> TrialParameters {
    TrialParameters::new(pool(10), 5, 250, 50)
        .with_tags(0, 1)
        .with_detect_key("space")
        .with_target_text("<p>Memorize the target.</p>")
}
