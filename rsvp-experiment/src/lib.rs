pub mod config;
pub mod error;
pub mod input;
pub mod session;
pub mod simulate;
pub mod state;
pub mod stream;
pub mod trial;

pub use config::{ConfigError, MsRange, SessionConfig, TrialParameters, TrialTiming};
pub use error::TrialError;
pub use input::{KeyHit, KeySource, KeyWait, KeyboardCapture, ListenerHandle, ScriptedKeys};
pub use session::{
    PlannedBlock, PlannedTrial, SessionPlan, SessionSummary, random_subject_id, seed_from_id,
};
pub use simulate::{SimulationMode, simulate_data_only, simulate_visual};
pub use state::TrialRunner;
pub use stream::Stream;
