use crate::config::{MsRange, SessionConfig, TrialParameters};
use rand::Rng;
use rand::seq::SliceRandom;
use rsvp_core::{ImageRef, Key, ResultRecord, SessionPhase};
use std::time::Duration;

pub const EXAMPLE_BLOCK_NUM: i64 = -1;
pub const EXAMPLE_TRIALS: usize = 3;
pub const EXAMPLE_STREAM_LENGTH: usize = 5;
pub const EXAMPLE_STIM_MS: u64 = 250;
pub const EXAMPLE_ISI_MS: u64 = 50;
pub const EXAMPLE_PRELOAD_BUDGET: Duration = Duration::from_secs(1);

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrial {
    pub params: TrialParameters,
    /// Blank pause after this trial.
    pub iti: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedBlock {
    pub phase: SessionPhase,
    pub block_num: i64,
    pub trials: Vec<PlannedTrial>,
}

/// Every trial of a session, fixed up front from one RNG.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub example: Option<PlannedBlock>,
    pub blocks: Vec<PlannedBlock>,
}

fn key_label(key: &Key) -> String {
    format!("<kbd>{}</kbd>", key.as_str().to_uppercase())
}

pub fn default_target_text(key: &Key) -> String {
    format!(
        "<p>Memorize the target.</p><p>Press {} to continue.</p>",
        key_label(key)
    )
}

fn draw<R: Rng + ?Sized>(range: MsRange, rng: &mut R) -> u64 {
    rng.random_range(range.min..=range.max)
}

impl SessionPlan {
    /// Example block (if enabled) then `n_blocks` blocks, each with its own
    /// exposure, blank and inter-trial times and its own shuffle of the pool.
    pub fn build<R: Rng + ?Sized>(config: &SessionConfig, rng: &mut R) -> Self {
        let target_text = config
            .target_text
            .clone()
            .unwrap_or_else(|| default_target_text(&config.detect_key));
        let base = TrialParameters {
            detect_key: config.detect_key.clone(),
            target_text: Some(target_text),
            render_on_canvas: config.render_on_canvas,
            stimulus_height: config.stimulus_height,
            stimulus_width: config.stimulus_width,
            maintain_aspect_ratio: config.maintain_aspect_ratio,
            ..TrialParameters::default()
        };

        let example = config.run_example.then(|| PlannedBlock {
            phase: SessionPhase::Example,
            block_num: EXAMPLE_BLOCK_NUM,
            trials: (1..=EXAMPLE_TRIALS as i64)
                .map(|trial_num| PlannedTrial {
                    params: TrialParameters {
                        block_num: Some(EXAMPLE_BLOCK_NUM),
                        trial_num: Some(trial_num),
                        images_pool: config.example_images.clone(),
                        stream_length: Some(EXAMPLE_STREAM_LENGTH),
                        stim_ms: Some(EXAMPLE_STIM_MS),
                        isi_ms: Some(EXAMPLE_ISI_MS),
                        ..base.clone()
                    },
                    iti: Duration::ZERO,
                })
                .collect(),
        });

        let blocks = (0..config.n_blocks as i64)
            .map(|block_num| {
                let stim_ms = draw(config.stim_range(), rng);
                let isi_ms = draw(config.isi_range(), rng);
                let iti = Duration::from_millis(draw(config.iti_range(), rng));
                let mut pool: Vec<ImageRef> = config.experiment_images.clone();
                pool.shuffle(rng);
                PlannedBlock {
                    phase: SessionPhase::Experiment,
                    block_num,
                    trials: (1..=config.block_length as i64)
                        .map(|trial_num| PlannedTrial {
                            params: TrialParameters {
                                block_num: Some(block_num),
                                trial_num: Some(trial_num),
                                images_pool: pool.clone(),
                                stream_length: Some(config.trial_length),
                                stim_ms: Some(stim_ms),
                                isi_ms: Some(isi_ms),
                                ..base.clone()
                            },
                            iti,
                        })
                        .collect(),
                }
            })
            .collect();

        Self { example, blocks }
    }

    pub fn trial_count(&self) -> usize {
        self.example.iter().chain(&self.blocks).map(|b| b.trials.len()).sum()
    }

    /// Blocks belonging to `phase`, in run order.
    pub fn blocks_for(&self, phase: SessionPhase) -> impl Iterator<Item = &PlannedBlock> {
        self.example
            .iter()
            .chain(&self.blocks)
            .filter(move |b| b.phase == phase)
    }

    pub fn trials(&self) -> impl Iterator<Item = &PlannedTrial> {
        self.example
            .iter()
            .chain(&self.blocks)
            .flat_map(|b| b.trials.iter())
    }
}

pub fn random_subject_id<R: Rng + ?Sized>(len: usize, rng: &mut R) -> String {
    (0..len)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Stable seed for a subject id (FNV-1a), so a session can be replayed.
pub fn seed_from_id(id: &str) -> u64 {
    id.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Hit rate over the experiment blocks; example trials do not count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSummary {
    pub trials: usize,
    pub correct: usize,
    pub hit_rate: f64,
}

impl SessionSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ResultRecord>) -> Self {
        let (trials, correct) = records
            .into_iter()
            .filter(|r| r.block_num.is_some_and(|b| b >= 0))
            .fold((0, 0), |(n, c), r| (n + 1, c + usize::from(r.correct)));
        let hit_rate = if trials > 0 {
            correct as f64 / trials as f64 * 100.0
        } else {
            0.0
        };
        Self {
            trials,
            correct,
            hit_rate,
        }
    }
}

/// Instruction and feedback screens shown between trials.
pub mod screens {
    use super::{SessionSummary, key_label};
    use rsvp_core::Key;
    use std::time::Duration;

    pub fn welcome(experiment_name: &str) -> String {
        format!("<h2>Welcome to the {experiment_name}!</h2><p>Press any key to begin.</p>")
    }

    pub fn preparation(max_load: Duration) -> String {
        format!(
            "<p>The experiment requires some initial preparation.</p>\
             <p>This may take up to {:.1} seconds.</p>\
             <p>Press any key to start the preparation.</p>",
            max_load.as_secs_f64()
        )
    }

    pub fn instructions(key: &Key) -> String {
        let k = key_label(key);
        format!(
            "<h2>Instructions</h2>\
             <p>You will first see a <b>target image</b>. Memorize it, then press {k}.</p>\
             <p>Next, a sequence of images will play. Press {k} as soon as the target image appears.</p>\
             <p>Press any key to continue.</p>"
        )
    }

    pub fn example_intro() -> String {
        "<h2>Example Block</h2><p>Press any key to continue.</p>".into()
    }

    pub fn example_done(trials: usize, correct: usize) -> String {
        format!(
            "<h2>Example Block Completed</h2>\
             <p>You completed {trials} trials.</p>\
             <p>You identified the target image correctly {correct} times.</p>\
             <p>Press any key to continue.</p>"
        )
    }

    pub fn summary(s: &SessionSummary) -> String {
        format!(
            "<h2>All done!</h2>\
             <p>You correctly identified {} out of {} targets ({:.2}%).</p>\
             <p>Thank you for participating.</p>",
            s.correct, s.trials, s.hit_rate
        )
    }
}
