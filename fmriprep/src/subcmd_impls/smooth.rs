use super::utils::{positive_mm, ConfigArgs};
use clap::Args;
use fmri::prep::{PipelineConfig, Result};
use fmri::tools::fsl;
use fmri::tools::{SystemRunner, ToolRunner};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Smooth {
    #[command(flatten)]
    config: ConfigArgs,
    /// 高斯核半高全宽(mm)。
    #[arg(long, value_parser = positive_mm)]
    fwhm: Option<f64>,
}

impl Smooth {
    pub fn run(&mut self) -> Result<()> {
        // [moco_mot_corr/moco.nii.gz] -> [smoothed/moco_smooth.nii.gz]
        let mut builder = self.config.builder()?;
        if let Some(fwhm) = self.fwhm {
            builder = builder.smooth_fwhm(fwhm);
        }
        let cfg = builder.build()?;
        run_stage(&cfg, &SystemRunner)?;
        Ok(())
    }
}

pub(super) fn run_stage<R: ToolRunner + ?Sized>(cfg: &PipelineConfig, runner: &R) -> Result<PathBuf> {
    fsl::smooth(
        runner,
        &cfg.moco_path(),
        &cfg.smooth_output_path(),
        cfg.smooth_fwhm(),
    )
}
