use super::utils::{threshold_method, ConfigArgs};
use clap::Args;
use fmri::prep::motion::{analyze_par_file, write_fd_artifacts};
use fmri::prep::{FdSummary, PipelineConfig, Result, ThresholdMethod};
use fmri::tools::fsl::{self, MotionCorrectionOutputs};
use fmri::tools::{SystemRunner, ToolRunner};

#[derive(Args, Debug)]
pub struct Moco {
    #[command(flatten)]
    config: ConfigArgs,
    /// FD异常阈值的计算方法：`iqr`或`median`。
    #[arg(long, value_parser = threshold_method)]
    method: Option<ThresholdMethod>,
}

impl Moco {
    pub fn run(&mut self) -> Result<()> {
        // [output/fMRI_motor_concat_var1.nii.gz] -> [output/moco_mot_corr/{moco.nii.gz, moco.par, fd*}]
        let mut builder = self.config.builder()?;
        if let Some(method) = self.method {
            builder = builder.fd_method(method);
        }
        let cfg = builder.build()?;
        run_stage(&cfg, &SystemRunner)?;
        Ok(())
    }
}

pub(super) fn run_stage<R: ToolRunner + ?Sized>(
    cfg: &PipelineConfig,
    runner: &R,
) -> Result<(MotionCorrectionOutputs, FdSummary)> {
    let outputs = fsl::motion_correct(runner, &cfg.concat_path(), &cfg.moco_dir(), cfg.dof())?;
    let (fd, summary) = analyze_par_file(&outputs.params, cfg.fd_radius_mm(), cfg.fd_method())?;
    summary.log();
    write_fd_artifacts(&cfg.moco_dir(), &fd, &summary)?;
    Ok((outputs, summary))
}
