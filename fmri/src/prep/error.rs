//! 预处理流程的错误类型。

use std::fmt::Write;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 预处理各阶段可能产生的错误。所有错误都直接向上传播，不做局部恢复。
#[derive(Error, Debug)]
pub enum PrepError {
    /// 调用外部工具之前发现输入文件缺失。
    #[error("missing input file(s): {}", join_paths(.0))]
    MissingInput(Vec<PathBuf>),

    /// 数值输入非法，例如方差为零。
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 参数取值非法，例如未知的阈值方法。
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 两个run的空间维度不一致。
    #[error("spatial shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    /// 运动参数表格式错误。
    #[error("malformed motion parameters at line {line}: {reason}")]
    MotionParse { line: usize, reason: String },

    /// 外部工具以非零状态退出。
    #[error("`{tool}` failed ({status}):\n{stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// 外部工具无法启动（通常是不在`PATH`中）。
    #[error("failed to launch `{tool}`: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// 配置文件或配置值错误。
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),
}

pub type Result<T> = std::result::Result<T, PrepError>;

impl PrepError {
    #[inline]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    #[inline]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    let mut s = String::new();
    for (i, p) in paths.iter().enumerate() {
        if i != 0 {
            s.push_str(", ");
        }
        let _ = write!(s, "`{}`", p.display());
    }
    s
}
