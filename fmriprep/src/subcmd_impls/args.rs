use clap::{Parser, Subcommand};
use super::error::CliError;

#[derive(Parser, Debug)]
#[command(name = "fmriprep")]
#[command(about = "单被试fMRI预处理流程：去颅骨、组织分割、run拼接、头动校正、配准与平滑。")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 子命令。
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub fn run_program(&mut self) -> Result<(), CliError> {
        match self.command {
            Commands::SkullStrip(ref mut v) => v.run()?,
            Commands::Segment(ref mut v) => v.run()?,
            Commands::Concat(ref mut v) => v.run()?,
            Commands::Moco(ref mut v) => v.run()?,
            Commands::Fd(ref mut v) => v.run()?,
            Commands::Coreg(ref mut v) => v.run()?,
            Commands::Smooth(ref mut v) => v.run()?,
            Commands::Snapshot(ref mut v) => v.run()?,
            Commands::RunAll(ref mut v) => v.run()?,
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 用`bet`对T1像去颅骨。
    SkullStrip(crate::subcmd_impls::skull_strip::SkullStrip),
    /// 用`fast`对去颅骨后的T1像做组织分割（CSF、灰质、白质）。
    Segment(crate::subcmd_impls::segment::Segment),
    /// 两个run分别方差规范化后沿时间维拼接。
    Concat(crate::subcmd_impls::concat::Concat),
    /// 用`mcflirt`做头动校正，并计算逐帧位移。
    Moco(crate::subcmd_impls::moco::Moco),
    /// 对已有的`.par`运动参数文件计算逐帧位移及异常阈值。
    Fd(crate::subcmd_impls::fd::Fd),
    /// 提取头动校正后的中间帧，用`epi_reg`(BBR)配准到T1像。仅用于可视化。
    Coreg(crate::subcmd_impls::coreg::Coreg),
    /// 用`fslmaths`做高斯空间平滑。
    Smooth(crate::subcmd_impls::smooth::Smooth),
    /// 将NIfTI体数据的中间轴位切片保存为灰度png。
    Snapshot(crate::subcmd_impls::snapshot::Snapshot),
    /// 按顺序执行全部预处理阶段。
    RunAll(crate::subcmd_impls::run_all::RunAll),
}
