use super::utils::ConfigArgs;
use super::{concat, coreg, moco, segment, skull_strip, smooth};
use clap::Args;
use fmri::prep::{FdSummary, PipelineConfig, Result, StageTimer};
use fmri::tools::{SystemRunner, ToolRunner};
use tracing::info;

#[derive(Args, Debug)]
pub struct RunAll {
    #[command(flatten)]
    config: ConfigArgs,
    /// 跳过仅用于可视化的配准阶段。
    #[arg(long)]
    skip_coreg: bool,
}

impl RunAll {
    pub fn run(&mut self) -> Result<()> {
        let cfg = self.config.load()?;
        Program::new(cfg, &SystemRunner, self.skip_coreg).run()?;
        Ok(())
    }
}

struct Program<'a, R: ToolRunner + ?Sized> {
    cfg: PipelineConfig,
    runner: &'a R,
    skip_coreg: bool,
    timer: StageTimer,
}

impl<'a, R: ToolRunner + ?Sized> Program<'a, R> {
    #[inline]
    pub fn new(cfg: PipelineConfig, runner: &'a R, skip_coreg: bool) -> Self {
        Self {
            cfg,
            runner,
            skip_coreg,
            timer: StageTimer::new(),
        }
    }

    /// 依次执行各阶段；任一阶段失败即终止。
    pub fn run(&mut self) -> Result<FdSummary> {
        info!("被试`{}`预处理开始", self.cfg.subject_id());

        self.timer.start();
        skull_strip::run_stage(&self.cfg, self.runner)?;
        self.timer.finish("skull-strip");

        self.timer.start();
        segment::run_stage(&self.cfg, self.runner)?;
        self.timer.finish("segment");

        self.timer.start();
        concat::run_stage(&self.cfg)?;
        self.timer.finish("concat");

        self.timer.start();
        let (_, summary) = moco::run_stage(&self.cfg, self.runner)?;
        self.timer.finish("moco");

        if self.skip_coreg {
            info!("跳过配准阶段");
        } else {
            self.timer.start();
            coreg::run_stage(&self.cfg, self.runner, None)?;
            self.timer.finish("coreg");
        }

        self.timer.start();
        smooth::run_stage(&self.cfg, self.runner)?;
        self.timer.finish("smooth");

        info!(
            "预处理完成，共 {} 个阶段，总耗时 {} ms",
            self.timer.stages().len(),
            self.timer.get_total_ms()
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmri::prep::nifti_io::write_volume;
    use fmri::prep::PrepError;
    use fmri::tools::{ToolCommand, ToolOutput, ToolStatus};
    use ndarray::Array4;
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// 按FSL的命名约定生成输出文件，而不真正运行FSL。
    struct FakeFsl {
        programs: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl FakeFsl {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                programs: RefCell::new(Vec::new()),
                fail_on,
            }
        }
    }

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    fn suffixed(stem: &str, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{stem}{suffix}"))
    }

    impl ToolRunner for FakeFsl {
        fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
            self.programs.borrow_mut().push(command.program().to_owned());
            if self.fail_on == Some(command.program()) {
                return Ok(ToolOutput {
                    status: ToolStatus::Exited(1),
                    stdout: String::new(),
                    stderr: "simulated failure".to_owned(),
                });
            }
            let args: Vec<String> = command
                .args()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            let value_of = |key: &str| {
                args.iter()
                    .find_map(|a| a.strip_prefix(key))
                    .map(str::to_owned)
                    .unwrap()
            };
            match command.program() {
                "bet" => {
                    touch(&suffixed(&args[1], ".nii.gz"));
                    touch(&suffixed(&args[1], "_mask.nii.gz"));
                }
                "fast" => {
                    let prefix = value_of("--out=");
                    for i in 0..3 {
                        touch(&suffixed(&prefix, &format!("_pve_{i}.nii.gz")));
                    }
                }
                "mcflirt" => {
                    fs::copy(&args[1], suffixed(&args[3], ".nii.gz")).unwrap();
                    let mut par = String::new();
                    for t in 0..8 {
                        let rx = if t >= 4 { 0.01 } else { 0.0 };
                        par.push_str(&format!("{rx}  0  0  0  0  0\n"));
                    }
                    fs::write(suffixed(&args[3], ".par"), par).unwrap();
                }
                "fslroi" => touch(Path::new(&args[1])),
                "epi_reg" => {
                    let stem = value_of("--out=");
                    touch(&suffixed(&stem, ".nii.gz"));
                    touch(&suffixed(&stem, ".mat"));
                }
                "fslmaths" => touch(Path::new(args.last().unwrap())),
                other => panic!("unexpected tool {other}"),
            }
            Ok(ToolOutput {
                status: ToolStatus::Exited(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn prepare_subject(base: &Path) -> PipelineConfig {
        let cfg = PipelineConfig::builder()
            .base_dir(base)
            .output_dir(base.join("output"))
            .build()
            .unwrap();
        fs::create_dir_all(cfg.t1w_path().parent().unwrap()).unwrap();
        touch(&cfg.t1w_path());
        let run = |offset: f32| {
            Array4::from_shape_fn((3, 3, 2, 4), |(x, y, z, t)| {
                offset + (x + 2 * y + 3 * z) as f32 + t as f32 * 0.5
            })
        };
        write_volume(cfg.run1_path(), &run(10.0), None).unwrap();
        write_volume(cfg.run2_path(), &run(20.0), None).unwrap();
        cfg
    }

    #[test]
    fn test_run_all_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = prepare_subject(dir.path());
        let fsl = FakeFsl::new(None);
        let summary = Program::new(cfg.clone(), &fsl, false).run().unwrap();

        assert_eq!(
            *fsl.programs.borrow(),
            ["bet", "fast", "mcflirt", "fslroi", "epi_reg", "fslmaths"]
        );
        assert_eq!(summary.n_transitions, 7);
        assert!((summary.max - 0.5).abs() < 1e-12);
        assert!(cfg.concat_path().is_file());
        assert!(cfg.moco_dir().join("fd_report.json").is_file());
        assert!(cfg.coreg_output_path().is_file());
        assert!(cfg.smooth_output_path().is_file());
    }

    #[test]
    fn test_run_all_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = prepare_subject(dir.path());
        let fsl = FakeFsl::new(Some("mcflirt"));
        let err = Program::new(cfg.clone(), &fsl, true).run().unwrap_err();
        assert!(matches!(err, PrepError::ToolFailed { ref tool, .. } if tool == "mcflirt"));
        assert_eq!(*fsl.programs.borrow(), ["bet", "fast", "mcflirt"]);
        assert!(!cfg.smooth_dir().exists());
    }

    #[test]
    fn test_run_all_missing_t1() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = prepare_subject(dir.path());
        fs::remove_file(cfg.t1w_path()).unwrap();
        let fsl = FakeFsl::new(None);
        let err = Program::new(cfg.clone(), &fsl, false).run().unwrap_err();
        assert!(matches!(err, PrepError::MissingInput(ref p) if p == &vec![cfg.t1w_path()]));
        assert!(fsl.programs.borrow().is_empty());
    }
}
