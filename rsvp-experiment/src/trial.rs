use crate::config::TrialTiming;
use crate::input::ListenerHandle;
use crate::stream::Stream;
use rsvp_core::{Key, ResultRecord, TrialState};

/// Runtime state of the one active trial. Created by `start`, dropped the
/// moment its record is emitted.
#[derive(Debug)]
pub struct ActiveTrial {
    pub block_num: Option<i64>,
    pub trial_num: Option<i64>,
    pub stream: Stream,
    pub timing: TrialTiming,
    pub detect_key: Key,
    pub caption: Option<String>,
    /// Sticky once any frame fails to decode in time.
    pub decode_failed: bool,
    pub phase: TrialPhase,
}

#[derive(Debug)]
pub enum TrialPhase {
    Study(StudyState),
    Streaming(StreamState),
}

#[derive(Debug)]
pub struct StudyState {
    pub readiness: ListenerHandle,
    pub shown_at: u64,
}

#[derive(Debug)]
pub struct StreamState {
    pub detect: ListenerHandle,
    pub encoding_time_ms: f64,
    pub started_at: u64,
    /// Frame on screen or last shown; `None` before the first frame.
    pub current_index: Option<usize>,
    pub responded: bool,
    pub response_index: Option<usize>,
    pub rt_ms: Option<f64>,
}

impl StreamState {
    pub fn new(detect: ListenerHandle, encoding_time_ms: f64, started_at: u64) -> Self {
        Self {
            detect,
            encoding_time_ms,
            started_at,
            current_index: None,
            responded: false,
            response_index: None,
            rt_ms: None,
        }
    }

    /// Bind a response to the frame currently shown. A press before the
    /// first frame counts as frame 0. Later presses are ignored.
    pub fn respond(&mut self, rt_ms: f64) {
        if self.responded {
            return;
        }
        self.responded = true;
        self.response_index = Some(self.current_index.unwrap_or(0));
        self.rt_ms = Some(rt_ms);
    }
}

impl ActiveTrial {
    pub fn state(&self) -> TrialState {
        match self.phase {
            TrialPhase::Study(_) => TrialState::Study,
            TrialPhase::Streaming(_) => TrialState::Streaming,
        }
    }

    pub fn listener(&self) -> ListenerHandle {
        match &self.phase {
            TrialPhase::Study(s) => s.readiness,
            TrialPhase::Streaming(s) => s.detect,
        }
    }

    pub fn into_record(self) -> ResultRecord {
        let stream_json = self.stream.to_json();
        let target_index = self.stream.target_index();
        let target = self.stream.target().to_string();
        let (encoding_time, responded, response_index, rt) = match &self.phase {
            TrialPhase::Streaming(s) => (s.encoding_time_ms, s.responded, s.response_index, s.rt_ms),
            TrialPhase::Study(_) => (0.0, false, None, None),
        };
        let response_image = response_index
            .and_then(|i| self.stream.get(i))
            .map(ToString::to_string);

        ResultRecord {
            block_num: self.block_num,
            trial_num: self.trial_num,
            stim_ms: self.timing.stim_ms(),
            isi_ms: self.timing.isi_ms(),
            stream_length: self.timing.stream_length,
            encoding_time,
            stream: stream_json,
            target,
            target_index,
            responded,
            response_index,
            response_image,
            rt,
            // Compared by position: equal images elsewhere in the pool do not count.
            correct: response_index == Some(target_index),
            img_decode_failed: self.decode_failed,
        }
    }
}
