//! 头动参数与逐帧位移（framewise displacement, FD）分析。

use super::error::{PrepError, Result};
use super::stats;
use ndarray::{s, Array1, Array2, ArrayView1, Axis};
use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// 每帧刚体参数个数：3个旋转（弧度）+ 3个平移（毫米）。
pub const PARAMS_PER_FRAME: usize = 6;

/// 将旋转换算为位移时默认的头部半径（毫米）。
pub const DEFAULT_RADIUS_MM: f64 = 50.0;

/// 头动参数表，形状为`[帧数, 6]`，行序即采集顺序。
#[derive(Clone, Debug, PartialEq)]
pub struct MotionParams {
    table: Array2<f64>,
}

impl MotionParams {
    /// 由`[N, 6]`数组构造。
    pub fn new(table: Array2<f64>) -> Result<Self> {
        if table.ncols() != PARAMS_PER_FRAME {
            return Err(PrepError::invalid_input(format!(
                "motion table must have {PARAMS_PER_FRAME} columns, got {}",
                table.ncols()
            )));
        }
        Ok(Self { table })
    }

    /// 由逐帧的参数行构造。
    pub fn from_rows(rows: &[[f64; PARAMS_PER_FRAME]]) -> Self {
        let table = Array2::from_shape_fn((rows.len(), PARAMS_PER_FRAME), |(i, j)| rows[i][j]);
        Self { table }
    }

    /// 读取MCFLIRT输出的`.par`文件。
    pub fn from_par_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PrepError::MissingInput(vec![path.to_path_buf()]));
        }
        fs::read_to_string(path)?.parse()
    }

    #[inline]
    pub fn n_frames(&self) -> usize {
        self.table.nrows()
    }

    #[inline]
    pub fn table(&self) -> &Array2<f64> {
        &self.table
    }

    /// 计算逐帧位移。
    ///
    /// 第一帧没有前一帧可供差分，因此被丢弃：返回长度为`N - 1`的序列，
    /// 第`i`项描述第`i`帧到第`i + 1`帧的变化。少于两帧时返回空序列。
    pub fn framewise_displacement(&self, radius_mm: f64) -> Vec<f64> {
        if self.n_frames() < 2 {
            return Vec::new();
        }
        let diff = &self.table.slice(s![1.., ..]) - &self.table.slice(s![..-1, ..]);
        diff.axis_iter(Axis(0))
            .map(|row| frame_displacement(row, radius_mm))
            .collect()
    }
}

#[inline]
fn frame_displacement(delta: ArrayView1<f64>, radius_mm: f64) -> f64 {
    // 小角度近似：弧长 = 角度 * 半径
    let rot: f64 = delta.slice(s![..3]).iter().map(|r| (r * radius_mm).abs()).sum();
    let trans: f64 = delta.slice(s![3..]).iter().map(|t| t.abs()).sum();
    rot + trans
}

impl FromStr for MotionParams {
    type Err = PrepError;

    /// 解析以空白分隔（MCFLIRT使用两个空格）的六列文本，跳过空行。
    fn from_str(s: &str) -> Result<Self> {
        let mut flat = Vec::new();
        let mut n_rows = 0;
        for (idx, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut n_cols = 0;
            for field in line.split_whitespace() {
                let v: f64 = field.parse().map_err(|_| PrepError::MotionParse {
                    line: idx + 1,
                    reason: format!("`{field}` is not a number"),
                })?;
                flat.push(v);
                n_cols += 1;
            }
            if n_cols != PARAMS_PER_FRAME {
                return Err(PrepError::MotionParse {
                    line: idx + 1,
                    reason: format!("expected {PARAMS_PER_FRAME} columns, got {n_cols}"),
                });
            }
            n_rows += 1;
        }
        Self::new(Array2::from_shape_vec((n_rows, PARAMS_PER_FRAME), flat)?)
    }
}

/// FD异常阈值的计算方法。
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ThresholdMethod {
    /// Q3 + 1.5 * IQR。
    #[default]
    Iqr,
    /// median + 5 * MAD。
    MedianMad,
}

impl ThresholdMethod {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            ThresholdMethod::Iqr => "iqr",
            ThresholdMethod::MedianMad => "median",
        }
    }

    /// 由FD序列计算阈值。空序列无法计算分位数，返回错误。
    pub fn threshold(self, fd: &[f64]) -> Result<f64> {
        if fd.is_empty() {
            return Err(PrepError::invalid_input(
                "cannot derive a threshold from an empty FD sequence",
            ));
        }
        let mut sorted = fd.to_vec();
        sorted.sort_by(f64::total_cmp);
        let threshold = match self {
            ThresholdMethod::Iqr => {
                let q1 = stats::quantile_sorted(&sorted, 0.25).unwrap_or_default();
                let q3 = stats::quantile_sorted(&sorted, 0.75).unwrap_or_default();
                q3 + 1.5 * (q3 - q1)
            }
            ThresholdMethod::MedianMad => {
                let median = stats::quantile_sorted(&sorted, 0.5).unwrap_or_default();
                let deviations: Vec<f64> = sorted.iter().map(|v| (v - median).abs()).collect();
                let mad = stats::median(&deviations).unwrap_or_default();
                median + 5.0 * mad
            }
        };
        Ok(threshold)
    }
}

impl FromStr for ThresholdMethod {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "iqr" => Ok(ThresholdMethod::Iqr),
            "median" => Ok(ThresholdMethod::MedianMad),
            other => Err(PrepError::invalid_argument(format!(
                "unknown FD threshold method `{other}` (expected `iqr` or `median`)"
            ))),
        }
    }
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// FD序列的汇总统计。
#[derive(Clone, Debug, PartialEq)]
pub struct FdSummary {
    pub method: ThresholdMethod,
    pub n_transitions: usize,
    pub mean: f64,
    pub median: f64,
    pub max: f64,
    pub threshold: f64,
    pub n_outliers: usize,
}

impl FdSummary {
    pub fn new(fd: &[f64], method: ThresholdMethod) -> Result<Self> {
        let threshold = method.threshold(fd)?;
        Ok(Self {
            method,
            n_transitions: fd.len(),
            mean: stats::mean(fd).unwrap_or_default(),
            median: stats::median(fd).unwrap_or_default(),
            max: stats::max(fd).unwrap_or_default(),
            threshold,
            n_outliers: fd.iter().filter(|&&v| v > threshold).count(),
        })
    }

    /// 超过阈值的帧占比（百分数）。
    #[inline]
    pub fn outlier_percent(&self) -> f64 {
        100.0 * self.n_outliers as f64 / self.n_transitions as f64
    }

    pub fn to_json(&self) -> json::JsonValue {
        json::object! {
            method: self.method.name(),
            n_transitions: self.n_transitions,
            mean_mm: self.mean,
            median_mm: self.median,
            max_mm: self.max,
            threshold_mm: self.threshold,
            n_outliers: self.n_outliers,
            outlier_percent: self.outlier_percent(),
        }
    }

    /// 输出FD统计信息。
    pub fn log(&self) {
        info!("逐帧位移统计:");
        info!("\t平均FD: {:.3} mm", self.mean);
        info!("\tFD中位数: {:.3} mm", self.median);
        info!("\t最大FD: {:.3} mm", self.max);
        info!("\t阈值 ({}): {:.3} mm", self.method, self.threshold);
        info!(
            "\t超过阈值的帧: {} ({:.1}%)",
            self.n_outliers,
            self.outlier_percent()
        );
    }
}

/// FD分析写出的文件。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FdArtifacts {
    pub text: PathBuf,
    pub npy: PathBuf,
    pub report: PathBuf,
}

/// 读取`.par`文件并完成FD分析。
pub fn analyze_par_file<P: AsRef<Path>>(
    par: P,
    radius_mm: f64,
    method: ThresholdMethod,
) -> Result<(Vec<f64>, FdSummary)> {
    let params = MotionParams::from_par_file(par)?;
    info!("运动参数: {} 帧", params.n_frames());
    let fd = params.framewise_displacement(radius_mm);
    let summary = FdSummary::new(&fd, method)?;
    Ok((fd, summary))
}

/// 在`dir`下写出`fd.txt`（每行一个值）、`fd.npy`与`fd_report.json`。
pub fn write_fd_artifacts(dir: &Path, fd: &[f64], summary: &FdSummary) -> Result<FdArtifacts> {
    fs::create_dir_all(dir)?;
    let artifacts = FdArtifacts {
        text: dir.join("fd.txt"),
        npy: dir.join("fd.npy"),
        report: dir.join("fd_report.json"),
    };

    let mut text = String::with_capacity(fd.len() * 12);
    for v in fd {
        let _ = writeln!(text, "{v:.6}");
    }
    fs::write(&artifacts.text, text)?;
    ndarray_npy::write_npy(&artifacts.npy, &Array1::from(fd.to_vec()))?;
    fs::write(&artifacts.report, summary.to_json().pretty(2))?;
    info!("FD结果已写入`{}`", dir.display());
    Ok(artifacts)
}
