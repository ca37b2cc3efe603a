use super::utils::ConfigArgs;
use clap::Args;
use fmri::prep::{PipelineConfig, Result};
use fmri::tools::fsl::{self, SegmentationOutputs};
use fmri::tools::{SystemRunner, ToolRunner};

#[derive(Args, Debug)]
pub struct Segment {
    #[command(flatten)]
    config: ConfigArgs,
}

impl Segment {
    pub fn run(&mut self) -> Result<()> {
        // [derivatives/T1w_brain.nii.gz] -> [derivatives/T1w_fast_pve_{0,1,2}.nii.gz]
        let cfg = self.config.load()?;
        run_stage(&cfg, &SystemRunner)?;
        Ok(())
    }
}

pub(super) fn run_stage<R: ToolRunner + ?Sized>(
    cfg: &PipelineConfig,
    runner: &R,
) -> Result<SegmentationOutputs> {
    fsl::segment_tissues(
        runner,
        &cfg.t1w_brain_path(),
        &cfg.derivatives_dir(),
        cfg.n_classes(),
    )
}
