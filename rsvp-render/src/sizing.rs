//! Display size policy for stream images.

use rsvp_core::{RenderMode, Sizing};

/// Canvas backing size `(width, height)` for an image of `natural` size.
///
/// An explicit width and height are always used as given, even when aspect
/// preservation was requested. A single explicit dimension drives the other
/// only when `maintain_aspect_ratio` is set; otherwise the other keeps its
/// natural value. Fractional results truncate, as canvas dimensions do.
pub fn canvas_size(sizing: &Sizing, natural: (u32, u32)) -> (u32, u32) {
    let (nw, nh) = natural;
    match (sizing.width, sizing.height) {
        (Some(w), Some(h)) => (w, h),
        (None, Some(h)) if sizing.maintain_aspect_ratio => (scale(nw, h, nh), h),
        (None, Some(h)) => (nw, h),
        (Some(w), None) if sizing.maintain_aspect_ratio => (w, scale(nh, w, nw)),
        (Some(w), None) => (w, nh),
        (None, None) => natural,
    }
}

/// Rendered size of a plain image element styled with the sizing hints.
///
/// Unset style dimensions follow the natural aspect ratio, so the flag has
/// no effect here.
pub fn element_size(sizing: &Sizing, natural: (u32, u32)) -> (u32, u32) {
    let (nw, nh) = natural;
    match (sizing.width, sizing.height) {
        (Some(w), Some(h)) => (w, h),
        (None, Some(h)) => (scale_round(nw, h, nh), h),
        (Some(w), None) => (w, scale_round(nh, w, nw)),
        (None, None) => natural,
    }
}

/// Size under the policy of the backend `mode` selects.
pub fn displayed_size(mode: RenderMode, sizing: &Sizing, natural: (u32, u32)) -> (u32, u32) {
    match mode {
        RenderMode::Canvas => canvas_size(sizing, natural),
        RenderMode::Element => element_size(sizing, natural),
    }
}

fn ratio(value: u32, num: u32, den: u32) -> f64 {
    if den == 0 {
        return 0.0;
    }
    value as f64 * num as f64 / den as f64
}

fn scale(value: u32, num: u32, den: u32) -> u32 {
    ratio(value, num, den) as u32
}

fn scale_round(value: u32, num: u32, den: u32) -> u32 {
    ratio(value, num, den).round() as u32
}
