use serde::{Deserialize, Serialize};

/// Trial state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// Target on screen, waiting for the readiness key.
    Study,
    Streaming,
    Finished,
}

/// Recorded result per trial, serialised as flat key/value pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub block_num: Option<i64>,
    pub trial_num: Option<i64>,
    pub stim_ms: u64,
    pub isi_ms: u64,
    pub stream_length: usize,
    /// ms from the target appearing to the readiness key.
    pub encoding_time: f64,
    /// JSON array of the image references in presentation order.
    pub stream: String,
    pub target: String,
    pub target_index: usize,
    pub responded: bool,
    pub response_index: Option<usize>,
    pub response_image: Option<String>,
    /// ms from stream start to the response.
    pub rt: Option<f64>,
    pub correct: bool,
    pub img_decode_failed: bool,
}
