/// Session phases around the trial engine.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Example,
    Experiment,
    Summary,
}

impl SessionPhase {
    /// Next phase in session order; `skip_example` jumps straight from the
    /// welcome screen to the experiment blocks.
    pub fn next(&self, skip_example: bool) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome if skip_example => Experiment,
            Welcome => Example,
            Example => Experiment,
            Experiment => Summary,
            Summary => return None,
        })
    }

    pub fn runs_trials(&self) -> bool {
        matches!(self, Self::Example | Self::Experiment)
    }

    pub fn is_welcome(&self) -> bool {
        matches!(self, Self::Welcome)
    }

    pub fn is_example(&self) -> bool {
        matches!(self, Self::Example)
    }

    pub fn is_experiment(&self) -> bool {
        matches!(self, Self::Experiment)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionPhase::*;

    #[test]
    fn phases_advance_in_order() {
        assert_eq!(Welcome.next(false), Some(Example));
        assert_eq!(Welcome.next(true), Some(Experiment));
        assert_eq!(Example.next(false), Some(Experiment));
        assert_eq!(Experiment.next(false), Some(Summary));
        assert_eq!(Summary.next(false), None);
        assert!(Example.runs_trials() && Experiment.runs_trials());
        assert!(!Welcome.runs_trials() && !Summary.runs_trials());
    }
}
