use crate::config::TrialParameters;
use crate::error::TrialError;
use crate::input::{KeySource, KeyWait, KeyboardCapture};
use crate::stream::Stream;
use crate::trial::{ActiveTrial, StreamState, StudyState, TrialPhase};
use log::{debug, info, warn};
use rand::Rng;
use rsvp_core::{KeyEvent, ResultRecord, Surface, TrialState};
use rsvp_timing::{Scheduler, Timer, duration_ns, ns_to_ms};

/// Steps chained on the scheduler while the stream runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamStep {
    ShowNext,
    Blank { index: usize },
}

/// Runs one trial at a time: target study, then the timed stream, then the
/// result record.
///
/// Hosts with their own event loop drive it with [`start`], [`poll`] and
/// [`key_pressed`]; [`run_trial`] does the same against a blocking
/// [`KeySource`]. Frame deadlines are absolute, each one computed from the
/// previous frame's due time rather than from when it was handled.
///
/// [`start`]: TrialRunner::start
/// [`poll`]: TrialRunner::poll
/// [`key_pressed`]: TrialRunner::key_pressed
/// [`run_trial`]: TrialRunner::run_trial
pub struct TrialRunner<S, T, R>
where
    S: Surface,
    T: Timer,
    R: Rng,
{
    surface: S,
    timer: T,
    rng: R,
    input: KeyboardCapture,
    scheduler: Scheduler<StreamStep>,
    active: Option<ActiveTrial>,
    completed: usize,
}

impl<S, T, R> TrialRunner<S, T, R>
where
    S: Surface,
    T: Timer,
    R: Rng,
{
    pub fn new(surface: S, timer: T, rng: R) -> Self {
        Self {
            surface,
            timer,
            rng,
            input: KeyboardCapture::new(),
            scheduler: Scheduler::new(),
            active: None,
            completed: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// `Finished` whenever no trial is active.
    pub fn state(&self) -> TrialState {
        self.active
            .as_ref()
            .map_or(TrialState::Finished, ActiveTrial::state)
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    /// When `poll` next has work to do; `None` while waiting on a key.
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Validate, draw the stream, show the target and wait for readiness.
    /// Nothing is rendered or armed when this fails.
    pub fn start(&mut self, params: &TrialParameters) -> Result<(), TrialError> {
        if self.active.is_some() {
            return Err(TrialError::AlreadyRunning);
        }
        let timing = params.validate()?;
        let stream = Stream::generate(&params.images_pool, timing.stream_length, &mut self.rng)?;

        self.surface.set_sizing(params.sizing());
        let outcome = self
            .surface
            .present(stream.target(), params.target_text.as_deref());
        if outcome.is_degraded() {
            warn!("target {} not decoded in time", stream.target());
        }

        let now = self.timer.now();
        let readiness = self
            .input
            .arm(now, std::slice::from_ref(&params.detect_key), false);
        info!(
            "trial {:?}/{:?} started: {} frames, {} ms + {} ms, target at {}",
            params.block_num,
            params.trial_num,
            timing.stream_length,
            timing.stim_ms(),
            timing.isi_ms(),
            stream.target_index()
        );

        self.active = Some(ActiveTrial {
            block_num: params.block_num,
            trial_num: params.trial_num,
            stream,
            timing,
            detect_key: params.detect_key.clone(),
            caption: params.target_text.clone(),
            decode_failed: outcome.is_degraded(),
            phase: TrialPhase::Study(StudyState {
                readiness,
                shown_at: now,
            }),
        });
        Ok(())
    }

    /// Run every step due by now. Returns the record if the trial finished.
    pub fn poll(&mut self) -> Option<ResultRecord> {
        let now = self.timer.now();
        self.advance(now)
    }

    /// Deliver one key event at the current time. Steps due at or before
    /// this instant run first.
    pub fn key_pressed(&mut self, event: &KeyEvent) -> Option<ResultRecord> {
        let now = self.timer.now();
        if let Some(record) = self.advance(now) {
            return Some(record);
        }

        let listener = self.active.as_ref()?.listener();
        let hit = self
            .input
            .dispatch(now, event)
            .into_iter()
            .find(|hit| hit.listener == listener)?;

        match self.state() {
            TrialState::Study => {
                self.begin_stream(now, hit.rt_ms);
                self.advance(now)
            }
            TrialState::Streaming => {
                if let Some(TrialPhase::Streaming(stream)) =
                    self.active.as_mut().map(|t| &mut t.phase)
                {
                    stream.respond(hit.rt_ms);
                    debug!(
                        "response at frame {:?} after {:.1} ms",
                        stream.response_index, hit.rt_ms
                    );
                }
                self.finish()
            }
            TrialState::Finished => None,
        }
    }

    /// Drop the active trial without a record.
    pub fn abort(&mut self) -> bool {
        let Some(trial) = self.active.take() else {
            return false;
        };
        self.scheduler.cancel_all();
        self.input.cancel(trial.listener());
        self.surface.reset();
        warn!("trial {:?}/{:?} aborted", trial.block_num, trial.trial_num);
        true
    }

    /// Run one trial to completion against a blocking key source.
    pub fn run_trial<K>(
        &mut self,
        params: &TrialParameters,
        keys: &mut K,
    ) -> Result<ResultRecord, TrialError>
    where
        K: KeySource<T>,
    {
        self.start(params)?;
        let mut input_open = true;
        loop {
            if let Some(record) = self.poll() {
                return Ok(record);
            }
            let deadline = self.next_deadline();

            if !input_open {
                match deadline {
                    Some(due) => {
                        self.timer.sleep_until(due);
                        continue;
                    }
                    None => {
                        self.abort();
                        return Err(TrialError::InputClosed);
                    }
                }
            }

            match keys.wait_key(&self.timer, deadline) {
                KeyWait::Pressed(event) => {
                    if let Some(record) = self.key_pressed(&event) {
                        return Ok(record);
                    }
                }
                KeyWait::TimedOut => {}
                KeyWait::Closed => {
                    debug!("key source closed");
                    input_open = false;
                }
            }
        }
    }

    fn begin_stream(&mut self, now: u64, encoding_time_ms: f64) {
        let Some(trial) = self.active.as_mut() else {
            return;
        };
        let detect = self
            .input
            .arm(now, std::slice::from_ref(&trial.detect_key), true);
        trial.phase = TrialPhase::Streaming(StreamState::new(detect, encoding_time_ms, now));
        debug!("stream started after {encoding_time_ms:.1} ms of study");
        self.scheduler.at(now, StreamStep::ShowNext);
    }

    fn advance(&mut self, now: u64) -> Option<ResultRecord> {
        while let Some((due, step)) = self.scheduler.pop_due(now) {
            if let Some(record) = self.step(due, step) {
                return Some(record);
            }
        }
        None
    }

    fn step(&mut self, due: u64, step: StreamStep) -> Option<ResultRecord> {
        let Some(ActiveTrial {
            stream,
            timing,
            decode_failed,
            phase: TrialPhase::Streaming(state),
            ..
        }) = self.active.as_mut()
        else {
            warn!("dropping {step:?} outside the stream phase");
            return None;
        };

        let done = match step {
            StreamStep::ShowNext => {
                let next = state.current_index.map_or(0, |i| i + 1);
                if state.responded || next >= stream.len() {
                    true
                } else {
                    state.current_index = Some(next);
                    let image = &stream.images()[next];
                    if self.surface.present(image, None).is_degraded() {
                        warn!("frame {next} ({image}) not decoded in time");
                        *decode_failed = true;
                    }
                    debug!(
                        "frame {next} due at {:.3} ms, shown at {:.3} ms",
                        ns_to_ms(due.saturating_sub(state.started_at)),
                        ns_to_ms(self.timer.now().saturating_sub(state.started_at))
                    );
                    self.scheduler.at(
                        due.saturating_add(duration_ns(timing.stim)),
                        StreamStep::Blank { index: next },
                    );
                    false
                }
            }
            StreamStep::Blank { index } => {
                self.surface.clear();
                if index + 1 >= stream.len() {
                    true
                } else {
                    self.scheduler
                        .at(due.saturating_add(duration_ns(timing.isi)), StreamStep::ShowNext);
                    false
                }
            }
        };

        if done { self.finish() } else { None }
    }

    fn finish(&mut self) -> Option<ResultRecord> {
        let trial = self.active.take()?;
        self.scheduler.cancel_all();
        self.input.cancel(trial.listener());
        self.surface.reset();

        let record = trial.into_record();
        self.completed += 1;
        info!(
            "trial {:?}/{:?} finished: responded {} at {:?}, target {}, correct {}",
            record.block_num,
            record.trial_num,
            record.responded,
            record.response_index,
            record.target_index,
            record.correct
        );
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rsvp_core::{ImageRef, PresentOutcome};
    use rsvp_timing::ManualTimer;
    use std::time::Duration;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl Surface for Log {
        fn present(&mut self, image: &ImageRef, caption: Option<&str>) -> PresentOutcome {
            self.0.push(format!("{image}|{}", caption.unwrap_or("")));
            PresentOutcome::Decoded
        }
        fn clear(&mut self) {
            self.0.push("clear".into());
        }
        fn reset(&mut self) {
            self.0.push("reset".into());
        }
    }

    fn runner() -> (TrialRunner<Log, ManualTimer, StdRng>, ManualTimer) {
        let timer = ManualTimer::new();
        let r = TrialRunner::new(Log::default(), timer.clone(), StdRng::seed_from_u64(5));
        (r, timer)
    }

    fn params() -> TrialParameters {
        let pool = (0..3).map(|i| ImageRef::new(format!("p{i}"))).collect();
        TrialParameters::new(pool, 2, 100, 20).with_target_text("<p>go</p>")
    }

    #[test]
    fn invalid_parameters_render_nothing() {
        let (mut r, _) = runner();
        let mut p = params();
        p.stream_length = Some(4);
        assert!(matches!(r.start(&p), Err(TrialError::InvalidParameters(_))));
        assert!(r.surface().0.is_empty());
        assert_eq!(r.state(), TrialState::Finished);
        assert_eq!(r.next_deadline(), None);
    }

    #[test]
    fn second_start_is_rejected() {
        let (mut r, _) = runner();
        r.start(&params()).unwrap();
        assert_eq!(r.start(&params()), Err(TrialError::AlreadyRunning));
        assert_eq!(r.surface().0.len(), 1);
    }

    #[test]
    fn stepping_through_a_trial() {
        let (mut r, timer) = runner();
        r.start(&params()).unwrap();
        assert_eq!(r.state(), TrialState::Study);
        assert!(r.surface().0[0].ends_with("|<p>go</p>"));
        assert_eq!(r.next_deadline(), None);

        timer.advance(Duration::from_millis(700));
        assert!(r.key_pressed(&KeyEvent::press("x")).is_none());
        assert_eq!(r.state(), TrialState::Study);
        assert!(r.key_pressed(&KeyEvent::press("space")).is_none());
        assert_eq!(r.state(), TrialState::Streaming);
        assert_eq!(r.surface().0.len(), 2, "first frame drawn at stream start");

        let mut record = None;
        while record.is_none() {
            let due = r.next_deadline().unwrap();
            timer.set(due);
            record = r.poll();
        }
        let record = record.unwrap();
        assert_eq!(timer.now(), (700 + 100 + 20 + 100) * 1_000_000);
        assert_eq!(record.encoding_time, 700.0);
        assert!(!record.responded);
        assert_eq!(r.state(), TrialState::Finished);
        assert_eq!(r.completed(), 1);
        assert_eq!(r.surface().0.last().map(String::as_str), Some("reset"));
        assert!(r.surface().0[1..].iter().filter(|e| e.contains('|')).all(|e| e.ends_with('|')));
    }

    #[test]
    fn abort_leaves_nothing_pending() {
        let (mut r, _) = runner();
        assert!(!r.abort());
        r.start(&params()).unwrap();
        assert!(r.abort());
        assert!(!r.is_running());
        assert!(r.key_pressed(&KeyEvent::press("space")).is_none());
        assert!(r.poll().is_none());
    }

    #[test]
    fn closed_input_during_study_fails() {
        let (mut r, _) = runner();
        let mut keys = crate::input::ScriptedKeys::new(0);
        assert_eq!(r.run_trial(&params(), &mut keys), Err(TrialError::InputClosed));
        assert!(!r.is_running());
    }
}
