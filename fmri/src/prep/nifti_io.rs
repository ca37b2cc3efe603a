//! NIfTI-1 (`.nii` / `.nii.gz`) 读写。

use super::error::{PrepError, Result};
use ndarray::{Array, Array4, ArrayD, Dimension, Ix4, RemoveAxis};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::fs;
use std::path::{Path, PathBuf};

/// 检查所有路径均为已存在的文件，否则返回列出全部缺失路径的错误。
pub fn require_files<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    let missing: Vec<PathBuf> = paths
        .iter()
        .map(AsRef::as_ref)
        .filter(|p| !p.is_file())
        .map(Path::to_path_buf)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PrepError::MissingInput(missing))
    }
}

/// 读取任意维度的体数据，体素值按头信息中的`scl_slope`/`scl_inter`换算为`f32`。
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<(NiftiHeader, ArrayD<f32>)> {
    let path = path.as_ref();
    require_files(&[path])?;
    let obj = ReaderOptions::new().read_file(path)?;
    let header = obj.header().clone();
    let data = obj.into_volume().into_ndarray::<f32>()?;
    Ok((header, data))
}

/// 读取`[x, y, z, t]`四维体数据。
pub fn read_volume_4d<P: AsRef<Path>>(path: P) -> Result<(NiftiHeader, Array4<f32>)> {
    let path = path.as_ref();
    let (header, data) = read_volume(path)?;
    if data.ndim() != 4 {
        return Err(PrepError::invalid_input(format!(
            "`{}` is {}D, expected a 4D series",
            path.display(),
            data.ndim()
        )));
    }
    Ok((header, data.into_dimensionality::<Ix4>()?))
}

/// 只读取头信息，返回时间维长度（三维数据视为1帧）。
pub fn frame_count<P: AsRef<Path>>(path: P) -> Result<usize> {
    let path = path.as_ref();
    require_files(&[path])?;
    let header = NiftiHeader::from_file(path)?;
    let dim = header.dim;
    if dim[0] < 4 {
        Ok(1)
    } else {
        Ok(dim[4] as usize)
    }
}

/// 写出体数据。给定`reference`时沿用其仿射矩阵与体素尺寸；数据已是物理量，故强度缩放重置为恒等。
/// 输出目录不存在时自动创建。
pub fn write_volume<P, D>(path: P, data: &Array<f32, D>, reference: Option<&NiftiHeader>) -> Result<()>
where
    P: AsRef<Path>,
    D: Dimension + RemoveAxis,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    match reference {
        Some(header) => {
            let mut header = header.clone();
            header.scl_slope = 1.0;
            header.scl_inter = 0.0;
            WriterOptions::new(path)
                .reference_header(&header)
                .write_nifti(data)?;
        }
        None => WriterOptions::new(path).write_nifti(data)?,
    }
    Ok(())
}
