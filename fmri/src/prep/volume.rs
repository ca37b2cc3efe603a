//! 脑掩膜、全局方差规范化与run拼接。

use super::error::{PrepError, Result};
use super::nifti_io;
use ndarray::{concatenate, Array3, Array4, ArrayView4, Axis, Zip};
use std::path::{Path, PathBuf};
use tracing::info;

/// 默认的脑掩膜阈值（时间维平均绝对强度）。
pub const DEFAULT_MASK_THRESHOLD: f32 = 1e-6;

/// 由`[x, y, z, t]`四维数据生成脑掩膜：体素沿时间维的平均绝对强度大于`threshold`即视为脑组织。
///
/// 时间维长度为0时平均值无定义，返回全`false`的掩膜。
pub fn create_brain_mask(volume: ArrayView4<f32>, threshold: f32) -> Array3<bool> {
    let (nx, ny, nz, nt) = volume.dim();
    if nt == 0 {
        return Array3::from_elem((nx, ny, nz), false);
    }
    let threshold = threshold as f64;
    let mut mask = Array3::from_elem((nx, ny, nz), false);
    Zip::from(&mut mask)
        .and(volume.lanes(Axis(3)))
        .for_each(|m, series| {
            let mean = series.iter().map(|v| v.abs() as f64).sum::<f64>() / nt as f64;
            *m = mean > threshold;
        });
    mask
}

/// 掩膜内全部（体素, 时间点）样本的总体方差（除以n）。掩膜为空时返回NaN。
pub fn compute_global_variance(volume: ArrayView4<f32>, mask: &Array3<bool>) -> f64 {
    let mut n = 0_usize;
    let mut sum = 0.0_f64;
    Zip::from(mask)
        .and(volume.lanes(Axis(3)))
        .for_each(|&m, series| {
            if m {
                n += series.len();
                sum += series.iter().map(|&v| v as f64).sum::<f64>();
            }
        });
    if n == 0 {
        return f64::NAN;
    }
    let mean = sum / n as f64;
    let mut ss = 0.0_f64;
    Zip::from(mask)
        .and(volume.lanes(Axis(3)))
        .for_each(|&m, series| {
            if m {
                ss += series.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>();
            }
        });
    ss / n as f64
}

/// 将整个体数据缩放为掩膜内方差为1，返回缩放后的数据以及重新计算得到的掩膜内方差。
pub fn normalize_variance(mut volume: Array4<f32>, mask: &Array3<bool>) -> Result<(Array4<f32>, f64)> {
    let variance = compute_global_variance(volume.view(), mask);
    if variance == 0.0 {
        return Err(PrepError::invalid_input(
            "cannot normalize: in-mask variance is zero",
        ));
    }
    if !variance.is_finite() {
        return Err(PrepError::invalid_input(
            "cannot normalize: brain mask selects no voxels",
        ));
    }
    let scale = (1.0 / variance.sqrt()) as f32;
    volume.mapv_inplace(|v| v * scale);
    let actual = compute_global_variance(volume.view(), mask);
    Ok((volume, actual))
}

/// 沿时间维拼接两个run，`run1`的所有帧在前。空间维度不一致时返回错误。
pub fn concatenate_runs<'a>(
    run1: ArrayView4<'a, f32>,
    run2: ArrayView4<'a, f32>,
) -> Result<Array4<f32>> {
    let left = &run1.shape()[..3];
    let right = &run2.shape()[..3];
    if left != right {
        return Err(PrepError::ShapeMismatch {
            left: left.to_vec(),
            right: right.to_vec(),
        });
    }
    Ok(concatenate(Axis(3), &[run1, run2])?)
}

/// 单个run规范化的结果。
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedRun {
    pub source: PathBuf,
    pub shape: Vec<usize>,
    pub brain_voxels: usize,
    pub variance_after: f64,
}

/// 拼接阶段的产物。
#[derive(Clone, Debug, PartialEq)]
pub struct ConcatReport {
    pub output: PathBuf,
    pub runs: [NormalizedRun; 2],
    pub shape: Vec<usize>,
}

fn load_and_normalize(path: &Path, mask_threshold: f32) -> Result<(nifti::NiftiHeader, Array4<f32>, NormalizedRun)> {
    let (header, data) = nifti_io::read_volume_4d(path)?;
    let shape = data.shape().to_vec();
    info!("run `{}`形状: {:?}", path.display(), shape);
    let mask = create_brain_mask(data.view(), mask_threshold);
    let brain_voxels = mask.iter().filter(|&&m| m).count();
    let (data, variance_after) = normalize_variance(data, &mask)?;
    info!("\t脑体素个数: {brain_voxels}, 规范化后方差: {variance_after:.6}");
    let run = NormalizedRun {
        source: path.to_path_buf(),
        shape,
        brain_voxels,
        variance_after,
    };
    Ok((header, data, run))
}

/// 读取两个run，分别以各自的脑掩膜做方差规范化，拼接后按`run1`的头信息写到`output`。
pub fn concatenate_run_files(
    run1_path: &Path,
    run2_path: &Path,
    output: &Path,
    mask_threshold: f32,
) -> Result<ConcatReport> {
    nifti_io::require_files(&[run1_path, run2_path])?;
    let (header, data1, run1) = load_and_normalize(run1_path, mask_threshold)?;
    let (_, data2, run2) = load_and_normalize(run2_path, mask_threshold)?;

    let joined = concatenate_runs(data1.view(), data2.view())?;
    let shape = joined.shape().to_vec();
    info!("拼接后形状: {shape:?}");
    nifti_io::write_volume(output, &joined, Some(&header))?;
    info!("拼接结果已写入`{}`", output.display());

    Ok(ConcatReport {
        output: output.to_path_buf(),
        runs: [run1, run2],
        shape,
    })
}
