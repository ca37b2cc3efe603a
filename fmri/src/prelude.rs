pub use super::prep::config::{ConfigBuilder, PipelineConfig};
pub use super::prep::error::{PrepError, Result};
pub use super::prep::log::StageTimer;
pub use super::prep::motion::{
    analyze_par_file, write_fd_artifacts, FdArtifacts, FdSummary, MotionParams, ThresholdMethod,
};
pub use super::prep::nifti_io::{read_volume, read_volume_4d, require_files, write_volume};
pub use super::prep::volume::{
    compute_global_variance, concatenate_run_files, concatenate_runs, create_brain_mask,
    normalize_variance, ConcatReport,
};
pub use super::tools::{fsl, SystemRunner, ToolCommand, ToolOutput, ToolRunner, ToolStatus};
