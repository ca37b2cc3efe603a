use super::utils::ConfigArgs;
use clap::Args;
use fmri::prep::{PipelineConfig, Result};
use fmri::tools::fsl::{self, SkullStripOutputs};
use fmri::tools::{SystemRunner, ToolRunner};

#[derive(Args, Debug)]
pub struct SkullStrip {
    #[command(flatten)]
    config: ConfigArgs,
}

impl SkullStrip {
    pub fn run(&mut self) -> Result<()> {
        // [subject/T1w/T1w.nii.gz] -> [derivatives/T1w_brain{,_mask}.nii.gz]
        let cfg = self.config.load()?;
        run_stage(&cfg, &SystemRunner)?;
        Ok(())
    }
}

pub(super) fn run_stage<R: ToolRunner + ?Sized>(
    cfg: &PipelineConfig,
    runner: &R,
) -> Result<SkullStripOutputs> {
    fsl::skull_strip(
        runner,
        &cfg.t1w_path(),
        &cfg.derivatives_dir(),
        cfg.bet_frac(),
        cfg.bet_grad(),
    )
}
