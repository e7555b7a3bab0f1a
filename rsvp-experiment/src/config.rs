use crate::error::TrialError;
use rsvp_core::{ImageRef, Key, RenderMode, Sizing};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Per-trial parameters, read-only to the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialParameters {
    pub block_num: Option<i64>,
    pub trial_num: Option<i64>,
    pub images_pool: Vec<ImageRef>,
    pub stream_length: Option<usize>,
    pub stim_ms: Option<u64>,
    pub isi_ms: Option<u64>,
    pub detect_key: Key,
    /// Caption HTML shown under the target during study.
    pub target_text: Option<String>,
    pub render_on_canvas: bool,
    pub stimulus_height: Option<u32>,
    pub stimulus_width: Option<u32>,
    pub maintain_aspect_ratio: bool,
}

impl Default for TrialParameters {
    fn default() -> Self {
        Self {
            block_num: None,
            trial_num: None,
            images_pool: Vec::new(),
            stream_length: None,
            stim_ms: None,
            isi_ms: None,
            detect_key: Key::space(),
            target_text: None,
            render_on_canvas: true,
            stimulus_height: None,
            stimulus_width: None,
            maintain_aspect_ratio: true,
        }
    }
}

/// Validated timing of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialTiming {
    pub stream_length: usize,
    pub stim: Duration,
    pub isi: Duration,
}

impl TrialTiming {
    pub fn stim_ms(&self) -> u64 {
        self.stim.as_millis() as u64
    }

    pub fn isi_ms(&self) -> u64 {
        self.isi.as_millis() as u64
    }

    /// Stream start to the last blank, when nothing ends the stream early.
    pub fn full_stream(&self) -> Duration {
        let frames = self.stream_length as u32;
        (self.stim + self.isi) * frames - self.isi
    }
}

impl TrialParameters {
    pub fn new(
        images_pool: Vec<ImageRef>,
        stream_length: usize,
        stim_ms: u64,
        isi_ms: u64,
    ) -> Self {
        Self {
            images_pool,
            stream_length: Some(stream_length),
            stim_ms: Some(stim_ms),
            isi_ms: Some(isi_ms),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, block_num: i64, trial_num: i64) -> Self {
        self.block_num = Some(block_num);
        self.trial_num = Some(trial_num);
        self
    }

    pub fn with_detect_key(mut self, key: impl Into<Key>) -> Self {
        self.detect_key = key.into();
        self
    }

    pub fn with_target_text(mut self, html: impl Into<String>) -> Self {
        self.target_text = Some(html.into());
        self
    }

    pub fn sizing(&self) -> Sizing {
        Sizing {
            height: self.stimulus_height,
            width: self.stimulus_width,
            maintain_aspect_ratio: self.maintain_aspect_ratio,
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        RenderMode::from_canvas_flag(self.render_on_canvas)
    }

    /// Checked before anything is rendered or scheduled.
    pub fn validate(&self) -> Result<TrialTiming, TrialError> {
        let stim_ms = self.stim_ms.ok_or_else(|| TrialError::missing("stim_ms"))?;
        let isi_ms = self.isi_ms.ok_or_else(|| TrialError::missing("isi_ms"))?;
        let stream_length = self
            .stream_length
            .ok_or_else(|| TrialError::missing("stream_length"))?;
        if self.images_pool.is_empty() {
            return Err(TrialError::missing("images_pool"));
        }
        if stim_ms == 0 {
            return Err(TrialError::InvalidParameters(
                "stim_ms must be greater than zero".into(),
            ));
        }
        if stream_length == 0 || stream_length > self.images_pool.len() {
            return Err(TrialError::InvalidParameters(format!(
                "stream_length {stream_length} must be between 1 and the pool size {}",
                self.images_pool.len()
            )));
        }
        Ok(TrialTiming {
            stream_length,
            stim: Duration::from_millis(stim_ms),
            isi: Duration::from_millis(isi_ms),
        })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Inclusive millisecond range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsRange {
    pub min: u64,
    pub max: u64,
}

impl MsRange {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

/// Whole-session settings, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub experiment_name: String,
    pub subject_id_length: usize,
    /// Fixed RNG seed; otherwise the seed derives from the subject id.
    pub seed: Option<u64>,
    pub n_blocks: usize,
    /// Trials per block.
    pub block_length: usize,
    /// Images per trial stream.
    pub trial_length: usize,
    pub detect_key: Key,
    pub stim_ms_min: u64,
    pub stim_ms_max: u64,
    pub isi_ms_min: u64,
    pub isi_ms_max: u64,
    pub iti_ms_min: u64,
    pub iti_ms_max: u64,
    pub run_example: bool,
    pub show_summary: bool,
    pub example_images: Vec<ImageRef>,
    pub experiment_images: Vec<ImageRef>,
    pub target_text: Option<String>,
    pub render_on_canvas: bool,
    pub stimulus_height: Option<u32>,
    pub stimulus_width: Option<u32>,
    pub maintain_aspect_ratio: bool,
    pub max_media_load_time_ms: u64,
    pub decode_tolerance_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            experiment_name: "RSVP Experiment".into(),
            subject_id_length: 8,
            seed: None,
            n_blocks: 5,
            block_length: 10,
            trial_length: 10,
            detect_key: Key::space(),
            stim_ms_min: 200,
            stim_ms_max: 400,
            isi_ms_min: 0,
            isi_ms_max: 100,
            iti_ms_min: 0,
            iti_ms_max: 100,
            run_example: true,
            show_summary: true,
            example_images: Vec::new(),
            experiment_images: Vec::new(),
            target_text: None,
            render_on_canvas: true,
            stimulus_height: None,
            stimulus_width: None,
            maintain_aspect_ratio: true,
            max_media_load_time_ms: 20_000,
            decode_tolerance_ms: 20,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn stim_range(&self) -> MsRange {
        MsRange::new(self.stim_ms_min, self.stim_ms_max)
    }

    pub fn isi_range(&self) -> MsRange {
        MsRange::new(self.isi_ms_min, self.isi_ms_max)
    }

    pub fn iti_range(&self) -> MsRange {
        MsRange::new(self.iti_ms_min, self.iti_ms_max)
    }

    pub fn max_media_load_time(&self) -> Duration {
        Duration::from_millis(self.max_media_load_time_ms)
    }

    pub fn decode_tolerance(&self) -> Duration {
        Duration::from_millis(self.decode_tolerance_ms)
    }

    /// Backend for the whole session; trials inherit it.
    pub fn render_mode(&self) -> RenderMode {
        RenderMode::from_canvas_flag(self.render_on_canvas)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, range) in [
            ("stim_ms", self.stim_range()),
            ("isi_ms", self.isi_range()),
            ("iti_ms", self.iti_range()),
        ] {
            if range.min > range.max {
                return Err(ConfigError::Invalid(format!(
                    "{name}_min {} exceeds {name}_max {}",
                    range.min, range.max
                )));
            }
        }
        if self.stim_ms_min == 0 {
            return Err(ConfigError::Invalid("stim_ms_min must be positive".into()));
        }
        if self.experiment_images.is_empty() {
            return Err(ConfigError::Invalid("experiment_images is empty".into()));
        }
        if self.trial_length == 0 || self.trial_length > self.experiment_images.len() {
            return Err(ConfigError::Invalid(format!(
                "trial_length {} must be between 1 and the {} experiment images",
                self.trial_length,
                self.experiment_images.len()
            )));
        }
        if self.run_example && self.example_images.len() < crate::session::EXAMPLE_STREAM_LENGTH {
            return Err(ConfigError::Invalid(format!(
                "the example block needs at least {} example_images",
                crate::session::EXAMPLE_STREAM_LENGTH
            )));
        }
        Ok(())
    }
}
