use super::utils::ConfigArgs;
use clap::Args;
use fmri::prep::nifti_io::require_files;
use fmri::prep::{PipelineConfig, Result};
use fmri::tools::fsl::{self, CoregOutputs};
use fmri::tools::{SystemRunner, ToolRunner};

#[derive(Args, Debug)]
pub struct Coreg {
    #[command(flatten)]
    config: ConfigArgs,
    /// 序列帧数；缺省时从头动校正结果的头信息中读取。
    #[arg(long)]
    frames: Option<usize>,
}

impl Coreg {
    pub fn run(&mut self) -> Result<()> {
        // [moco_mot_corr/moco.nii.gz, T1w, derivatives] -> [coreg/moco_vol_{middle,bbr}.nii.gz]
        let cfg = self.config.load()?;
        run_stage(&cfg, &SystemRunner, self.frames)?;
        Ok(())
    }
}

pub(super) fn run_stage<R: ToolRunner + ?Sized>(
    cfg: &PipelineConfig,
    runner: &R,
    frames: Option<usize>,
) -> Result<CoregOutputs> {
    require_files(&[
        cfg.moco_path(),
        cfg.t1w_path(),
        cfg.t1w_brain_path(),
        cfg.wm_seg_path(),
    ])?;
    let middle = fsl::extract_middle_volume(
        runner,
        &cfg.moco_path(),
        &cfg.middle_volume_path(),
        frames,
    )?;
    fsl::coregister_epi(
        runner,
        &middle,
        &cfg.t1w_path(),
        &cfg.t1w_brain_path(),
        &cfg.wm_seg_path(),
        &cfg.coreg_output_path(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmri::prep::PrepError;
    use fmri::tools::{ToolCommand, ToolOutput};
    use std::cell::Cell;
    use std::fs;

    struct CountingRunner {
        calls: Cell<usize>,
    }

    impl ToolRunner for CountingRunner {
        fn run(&self, _: &ToolCommand) -> Result<ToolOutput> {
            self.calls.set(self.calls.get() + 1);
            Err(PrepError::invalid_input("no tool should run"))
        }
    }

    #[test]
    fn test_structural_inputs_checked_before_fslroi() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PipelineConfig::builder()
            .base_dir(dir.path())
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        fs::create_dir_all(cfg.moco_dir()).unwrap();
        fs::write(cfg.moco_path(), b"").unwrap();
        let runner = CountingRunner {
            calls: Cell::new(0),
        };

        match run_stage(&cfg, &runner, Some(4)) {
            Err(PrepError::MissingInput(missing)) => assert_eq!(
                missing,
                vec![cfg.t1w_path(), cfg.t1w_brain_path(), cfg.wm_seg_path()]
            ),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(runner.calls.get(), 0);
    }
}
