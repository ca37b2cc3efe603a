pub mod config;
pub mod error;
pub mod log;
pub mod motion;
pub mod nifti_io;
pub mod stats;
pub mod volume;

pub use config::PipelineConfig;
pub use error::{PrepError, Result};
pub use log::StageTimer;
pub use motion::{FdArtifacts, FdSummary, MotionParams, ThresholdMethod};
pub use volume::{ConcatReport, NormalizedRun};
