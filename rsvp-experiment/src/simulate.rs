use crate::config::TrialParameters;
use crate::error::TrialError;
use crate::input::ScriptedKeys;
use crate::state::TrialRunner;
use log::debug;
use rand::Rng;
use rsvp_core::{ResultRecord, Surface};
use rsvp_timing::Timer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Headless ways of producing a trial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationMode {
    /// Synthesize the record without rendering or timing anything.
    DataOnly,
    /// Run the real runner with scripted key presses.
    Visual,
}

const DEFAULT_STIM_MS: u64 = 100;
const DEFAULT_STREAM_LENGTH: usize = 10;
const HIT_RATE: f64 = 0.7;

fn default_record<R: Rng + ?Sized>(params: &TrialParameters, rng: &mut R) -> ResultRecord {
    let stream_length = params.stream_length.unwrap_or(DEFAULT_STREAM_LENGTH);
    let stim_ms = params.stim_ms.unwrap_or(DEFAULT_STIM_MS);
    let isi_ms = params.isi_ms.unwrap_or(0);
    let response_index = stream_length / 2;
    // a miss puts the target on any other frame
    let target_index = if stream_length < 2 || rng.random_bool(HIT_RATE) {
        response_index
    } else {
        (response_index + rng.random_range(1..stream_length)) % stream_length
    };
    ResultRecord {
        block_num: params.block_num.or(Some(1)),
        trial_num: params.trial_num.or(Some(1)),
        stim_ms,
        isi_ms,
        stream_length,
        encoding_time: 500.0,
        stream: "[]".into(),
        target: String::new(),
        target_index,
        responded: true,
        response_index: Some(response_index),
        response_image: Some(String::new()),
        rt: Some((response_index as u64 * (stim_ms + isi_ms)) as f64),
        correct: true,
        img_decode_failed: rng.random_bool(0.05),
    }
}

/// Overlay the keys of `overrides` (a JSON object) onto `record`.
fn merge(record: ResultRecord, overrides: &Value) -> Result<ResultRecord, TrialError> {
    let Some(fields) = overrides.as_object() else {
        return Err(TrialError::InvalidParameters(
            "simulation overrides must be a JSON object".into(),
        ));
    };
    let mut merged = serde_json::to_value(record)
        .map_err(|e| TrialError::InvalidParameters(format!("simulation data: {e}")))?;
    if let Some(target) = merged.as_object_mut() {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(merged)
        .map_err(|e| TrialError::InvalidParameters(format!("simulation overrides: {e}")))
}

fn make_consistent(record: &mut ResultRecord) {
    if !record.responded {
        record.response_index = None;
        record.response_image = None;
        record.rt = None;
        record.correct = false;
        return;
    }
    let last = record.stream_length.saturating_sub(1);
    record.target_index = record.target_index.min(last);
    record.response_index = Some(record.response_index.unwrap_or(0).min(last));
    record.correct = record.response_index == Some(record.target_index);
}

/// Synthesize a plausible record for `params` without running the trial.
pub fn simulate_data_only<R: Rng + ?Sized>(
    params: &TrialParameters,
    overrides: Option<&Value>,
    rng: &mut R,
) -> Result<ResultRecord, TrialError> {
    let mut record = default_record(params, rng);
    if let Some(overrides) = overrides {
        record = merge(record, overrides)?;
    }
    make_consistent(&mut record);
    debug!(
        "simulated trial {:?}/{:?}: correct {}",
        record.block_num, record.trial_num, record.correct
    );
    Ok(record)
}

/// Run the real trial with the detect key pressed 300 ms after start and
/// again once the stream is a couple of frames in.
pub fn simulate_visual<S, T, R>(
    runner: &mut TrialRunner<S, T, R>,
    params: &TrialParameters,
) -> Result<ResultRecord, TrialError>
where
    S: Surface,
    T: Timer,
    R: Rng,
{
    let frame_ms = params.stim_ms.unwrap_or(DEFAULT_STIM_MS) + params.isi_ms.unwrap_or(0);
    let second = (2 * frame_ms + 100).min(500);
    let mut keys = ScriptedKeys::new(runner.timer().now())
        .press_after(Duration::from_millis(300), params.detect_key.clone())
        .press_after(Duration::from_millis(second), params.detect_key.clone());
    runner.run_trial(params, &mut keys)
}
