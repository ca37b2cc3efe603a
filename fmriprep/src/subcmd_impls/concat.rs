use super::utils::ConfigArgs;
use clap::Args;
use fmri::prep::volume::concatenate_run_files;
use fmri::prep::{ConcatReport, PipelineConfig, Result};

#[derive(Args, Debug)]
pub struct Concat {
    #[command(flatten)]
    config: ConfigArgs,
}

impl Concat {
    pub fn run(&mut self) -> Result<()> {
        // [fMRI/tfMRI_MOTOR_{LR,RL}] -> [output/fMRI_motor_concat_var1.nii.gz]
        let cfg = self.config.load()?;
        run_stage(&cfg)?;
        Ok(())
    }
}

pub(super) fn run_stage(cfg: &PipelineConfig) -> Result<ConcatReport> {
    concatenate_run_files(
        &cfg.run1_path(),
        &cfg.run2_path(),
        &cfg.concat_path(),
        cfg.mask_threshold(),
    )
}
