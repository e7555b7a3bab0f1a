use rsvp_core::{ImageRef, SessionPhase};
use rsvp_experiment::session::{EXAMPLE_PRELOAD_BUDGET, screens};
use rsvp_experiment::{PlannedTrial, SessionConfig, SessionPlan, SessionSummary};
use std::collections::VecDeque;
use std::time::Duration;

/// Text screens; the ones reporting results are filled in when shown.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Welcome,
    Preparation,
    Instructions,
    ExampleIntro,
    ExampleDone,
    Summary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Wait for any key.
    Screen(Screen),
    Preload(Vec<ImageRef>, Duration),
    Trial(Box<PlannedTrial>),
    /// Blank display, keys ignored.
    Pause(Duration),
}

/// Everything the windowed session does, in order.
pub fn session_steps(
    config: &SessionConfig,
    plan: &SessionPlan,
) -> VecDeque<(SessionPhase, Step)> {
    let mut steps = VecDeque::new();
    let skip_example = plan.example.is_none();
    let mut phase = Some(SessionPhase::Welcome);

    while let Some(current) = phase {
        let mut push = |step| steps.push_back((current, step));
        match current {
            SessionPhase::Welcome => {
                push(Step::Screen(Screen::Welcome));
                push(Step::Screen(Screen::Preparation));
                push(Step::Preload(
                    config.experiment_images.clone(),
                    config.max_media_load_time(),
                ));
                push(Step::Screen(Screen::Instructions));
            }
            SessionPhase::Example => {
                push(Step::Screen(Screen::ExampleIntro));
                push(Step::Preload(
                    config.example_images.clone(),
                    EXAMPLE_PRELOAD_BUDGET,
                ));
                for block in plan.blocks_for(SessionPhase::Example) {
                    for trial in &block.trials {
                        push(Step::Trial(Box::new(trial.clone())));
                    }
                }
                push(Step::Screen(Screen::ExampleDone));
            }
            SessionPhase::Experiment => {
                for block in plan.blocks_for(SessionPhase::Experiment) {
                    for trial in &block.trials {
                        push(Step::Trial(Box::new(trial.clone())));
                        push(Step::Pause(trial.iti));
                    }
                }
            }
            SessionPhase::Summary => {
                if config.show_summary {
                    push(Step::Screen(Screen::Summary));
                }
            }
        }
        phase = current.next(skip_example);
    }
    steps
}

/// `example` is (trials, correct) over the example block.
pub fn screen_html(
    screen: &Screen,
    config: &SessionConfig,
    summary: &SessionSummary,
    example: (usize, usize),
) -> String {
    match screen {
        Screen::Welcome => screens::welcome(&config.experiment_name),
        Screen::Preparation => screens::preparation(config.max_media_load_time()),
        Screen::Instructions => screens::instructions(&config.detect_key),
        Screen::ExampleIntro => screens::example_intro(),
        Screen::ExampleDone => screens::example_done(example.0, example.1),
        Screen::Summary => screens::summary(summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn config(run_example: bool) -> SessionConfig {
        let images: Vec<ImageRef> = (0..10).map(|i| ImageRef::new(format!("{i}.png"))).collect();
        SessionConfig {
            n_blocks: 2,
            block_length: 2,
            trial_length: 4,
            run_example,
            example_images: images.clone(),
            experiment_images: images,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn steps_follow_session_phases() {
        let c = config(true);
        let plan = SessionPlan::build(&c, &mut StdRng::seed_from_u64(1));
        let steps = session_steps(&c, &plan);

        let phases: Vec<SessionPhase> = steps.iter().map(|(p, _)| *p).collect();
        let mut sorted = phases.clone();
        sorted.dedup();
        assert_eq!(
            sorted,
            vec![
                SessionPhase::Welcome,
                SessionPhase::Example,
                SessionPhase::Experiment,
                SessionPhase::Summary
            ]
        );
        let trials = steps.iter().filter(|(_, s)| matches!(s, Step::Trial(_))).count();
        assert_eq!(trials, 3 + 4);
        let pauses = steps.iter().filter(|(_, s)| matches!(s, Step::Pause(_))).count();
        assert_eq!(pauses, 4);
        assert_eq!(steps.back().map(|(_, s)| s), Some(&Step::Screen(Screen::Summary)));
    }

    #[test]
    fn example_and_summary_can_be_skipped() {
        let c = SessionConfig {
            show_summary: false,
            ..config(false)
        };
        let plan = SessionPlan::build(&c, &mut StdRng::seed_from_u64(1));
        let steps = session_steps(&c, &plan);
        assert!(steps.iter().all(|(p, _)| !p.is_example()));
        assert!(!steps.iter().any(|(_, s)| *s == Step::Screen(Screen::Summary)));
        assert!(matches!(steps.back(), Some((SessionPhase::Experiment, Step::Pause(_)))));
    }

    #[test]
    fn result_screens_include_counts() {
        let c = config(true);
        let summary = SessionSummary {
            trials: 4,
            correct: 3,
            hit_rate: 75.0,
        };
        assert!(screen_html(&Screen::ExampleDone, &c, &summary, (3, 2)).contains("correctly 2 times"));
        assert!(screen_html(&Screen::Summary, &c, &summary, (0, 0)).contains("(75.00%)"));
    }
}
