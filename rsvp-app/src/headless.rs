use crate::records::RecordSink;
use anyhow::Result;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rsvp_core::Surface;
use rsvp_experiment::session::EXAMPLE_PRELOAD_BUDGET;
use rsvp_experiment::{
    SessionConfig, SessionPlan, SessionSummary, SimulationMode, TrialRunner, simulate_data_only,
    simulate_visual,
};
use rsvp_render::{Backend, FsLoader};
use rsvp_timing::{ManualTimer, Timer};
use std::io::Write;
use std::path::Path;

/// Offscreen canvas size when the session renders on a canvas.
const VIEWPORT: (u32, u32) = (800, 600);

fn backend(config: &SessionConfig, media_root: &Path) -> Result<Backend<FsLoader>> {
    Backend::new(
        config.render_mode(),
        FsLoader::new(media_root),
        VIEWPORT,
        config.decode_tolerance(),
    )
}

/// Warm the decode cache with every pool the plan draws from; returns the
/// number of images that failed.
fn preload<S: Surface>(surface: &mut S, config: &SessionConfig) -> usize {
    let mut pools = vec![(&config.experiment_images, config.max_media_load_time())];
    if config.run_example {
        pools.push((&config.example_images, EXAMPLE_PRELOAD_BUDGET));
    }
    let mut failed = 0;
    for (pool, budget) in pools {
        let report = surface.preload(pool, budget);
        if report.timed_out {
            warn!("preload stopped after {} ms", budget.as_millis());
        }
        failed += report.failed.len();
    }
    if failed > 0 {
        warn!("{failed} images failed to load");
    }
    failed
}

/// Run every planned trial without a window, writing one record per line.
pub fn run<W: Write>(
    config: &SessionConfig,
    media_root: &Path,
    mode: SimulationMode,
    seed: u64,
    sink: &mut RecordSink<W>,
) -> Result<SessionSummary> {
    let mut rng = StdRng::seed_from_u64(seed);
    let plan = SessionPlan::build(config, &mut rng);
    info!(
        "simulating {} trials ({mode:?}, seed {seed})",
        plan.trial_count()
    );

    match mode {
        SimulationMode::DataOnly => {
            for trial in plan.trials() {
                sink.emit(simulate_data_only(&trial.params, None, &mut rng)?)?;
            }
        }
        SimulationMode::Visual => {
            let mut surface = backend(config, media_root)?;
            debug!("rendering with the {:?} backend", surface.mode());
            preload(&mut surface, config);
            let timer = ManualTimer::new();
            let mut runner = TrialRunner::new(surface, timer.clone(), rng);
            for trial in plan.trials() {
                sink.emit(simulate_visual(&mut runner, &trial.params)?)?;
                timer.sleep(trial.iti);
            }
        }
    }

    let summary = SessionSummary::from_records(sink.records());
    info!(
        "{} of {} targets found ({:.2}%)",
        summary.correct, summary.trials, summary.hit_rate
    );
    Ok(summary)
}
