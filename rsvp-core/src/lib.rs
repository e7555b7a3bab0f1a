pub mod input;
pub mod phase;
pub mod stimulus;
pub mod surface;
pub mod trial;

pub use input::{Key, KeyEvent};
pub use phase::SessionPhase;
pub use stimulus::{ImageRef, RenderMode, Sizing};
pub use surface::{PreloadReport, PresentOutcome, Surface};
pub use trial::{ResultRecord, TrialState};
