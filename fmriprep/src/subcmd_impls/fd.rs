use super::utils::{positive_mm, threshold_method, ConfigArgs};
use clap::Args;
use fmri::prep::motion::{analyze_par_file, write_fd_artifacts};
use fmri::prep::{Result, ThresholdMethod};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct Fd {
    #[command(flatten)]
    config: ConfigArgs,
    /// `.par`运动参数文件；缺省为头动校正输出目录下的`moco.par`。
    #[arg(long)]
    par: Option<PathBuf>,
    /// FD异常阈值的计算方法：`iqr`或`median`。
    #[arg(long, value_parser = threshold_method)]
    method: Option<ThresholdMethod>,
    /// 旋转换算为位移时的头部半径(mm)。
    #[arg(long, value_parser = positive_mm)]
    radius: Option<f64>,
    /// 结果输出目录；缺省为`.par`文件所在目录。
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,
}

impl Fd {
    pub fn run(&mut self) -> Result<()> {
        let mut builder = self.config.builder()?;
        if let Some(method) = self.method {
            builder = builder.fd_method(method);
        }
        if let Some(radius) = self.radius {
            builder = builder.fd_radius_mm(radius);
        }
        let cfg = builder.build()?;

        let par = self.par.clone().unwrap_or_else(|| cfg.moco_par_path());
        let out_dir = match self.out_dir {
            Some(ref dir) => dir.clone(),
            None => par
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let (fd, summary) = analyze_par_file(&par, cfg.fd_radius_mm(), cfg.fd_method())?;
        summary.log();
        write_fd_artifacts(&out_dir, &fd, &summary)?;
        Ok(())
    }
}
