//! 外部命令行工具的统一调用约定。
//!
//! 所有外部工具都遵循同一流程：检查输入文件 -> 创建输出目录 -> 阻塞执行 -> 检查退出状态 -> 返回约定的输出路径。

pub mod fsl;

use crate::prep::error::{PrepError, Result};
use crate::prep::nifti_io::require_files;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::debug;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        use self::unix::describe_status;
    } else {
        fn describe_status(status: &ExitStatus) -> ToolStatus {
            match status.code() {
                Some(code) => ToolStatus::Exited(code),
                None => ToolStatus::Unknown,
            }
        }
    }
}

/// 一次外部调用：可执行文件名加参数列表。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    #[inline]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[inline]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// `--key=value`形式的参数。
    pub fn kv_arg(self, key: &str, value: impl AsRef<OsStr>) -> Self {
        let mut s = OsString::from(key);
        s.push("=");
        s.push(value);
        self.arg(s)
    }

    #[inline]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[inline]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// 便于日志输出的命令行文本。
    pub fn command_line(&self) -> String {
        let mut s = self.program.clone();
        for a in self.args.iter() {
            s.push(' ');
            s.push_str(&a.to_string_lossy());
        }
        s
    }
}

/// 外部进程的结束方式。
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ToolStatus {
    Exited(i32),
    Signaled(i32),
    Unknown,
}

impl ToolStatus {
    #[inline]
    pub fn success(self) -> bool {
        matches!(self, ToolStatus::Exited(0))
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Exited(code) => write!(f, "exit code {code}"),
            ToolStatus::Signaled(sig) => write!(f, "terminated by signal {sig}"),
            ToolStatus::Unknown => f.write_str("unknown exit status"),
        }
    }
}

impl From<&ExitStatus> for ToolStatus {
    #[inline]
    fn from(status: &ExitStatus) -> Self {
        describe_status(status)
    }
}

/// 外部进程执行完毕后的状态与捕获的输出。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolOutput {
    pub status: ToolStatus,
    pub stdout: String,
    pub stderr: String,
}

/// 执行外部命令的接口。测试中可替换为不启动真实进程的实现。
pub trait ToolRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// 通过`std::process::Command`阻塞执行，不设超时。
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let output = Command::new(command.program())
            .args(command.args())
            .output()
            .map_err(|source| PrepError::ToolLaunch {
                tool: command.program().to_owned(),
                source,
            })?;
        Ok(ToolOutput {
            status: ToolStatus::from(&output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// 一个外部工具步骤：所需输入、输出目录、命令以及工具约定会生成的输出文件。
#[derive(Clone, Debug)]
pub struct ToolStep {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub command: ToolCommand,
    pub outputs: Vec<PathBuf>,
}

/// 按统一约定执行`step`，成功时返回`step.outputs`。
pub fn invoke<R: ToolRunner + ?Sized>(runner: &R, step: ToolStep) -> Result<Vec<PathBuf>> {
    require_files(&step.inputs)?;
    fs::create_dir_all(&step.output_dir)?;

    debug!("执行: {}", step.command.command_line());
    let output = runner.run(&step.command)?;
    if !output.status.success() {
        return Err(PrepError::ToolFailed {
            tool: step.command.program().to_owned(),
            status: output.status.to_string(),
            stderr: output.stderr,
        });
    }
    Ok(step.outputs)
}

/// 在路径末尾追加后缀，例如`moco` -> `moco.nii.gz`。
pub fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut s = stem.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// 去掉`.nii.gz`或`.nii`扩展名。
pub fn nifti_stem(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    for ext in [".nii.gz", ".nii"] {
        if let Some(stripped) = s.strip_suffix(ext) {
            return PathBuf::from(stripped);
        }
    }
    path.to_path_buf()
}

/// 输出文件所在目录；裸文件名视为当前目录。
pub(crate) fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ToolCommand, ToolOutput, ToolRunner, ToolStatus};
    use crate::prep::error::Result;
    use std::cell::RefCell;

    /// 记录所有命令、返回固定结果的假执行器。
    pub struct RecordingRunner {
        pub calls: RefCell<Vec<ToolCommand>>,
        status: ToolStatus,
        stderr: String,
    }

    impl RecordingRunner {
        pub fn ok() -> Self {
            Self::with_status(ToolStatus::Exited(0), "")
        }

        pub fn with_status(status: ToolStatus, stderr: &str) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                status,
                stderr: stderr.to_owned(),
            }
        }

        /// 最近一次调用的命令行文本。
        pub fn last_line(&self) -> String {
            self.calls
                .borrow()
                .last()
                .map(ToolCommand::command_line)
                .unwrap_or_default()
        }
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
            self.calls.borrow_mut().push(command.clone());
            Ok(ToolOutput {
                status: self.status,
                stdout: String::new(),
                stderr: self.stderr.clone(),
            })
        }
    }
}
