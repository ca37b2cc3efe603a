use super::error::CliError;
use clap::Args;
use fmri::prep::nifti_io::read_volume;
use fmri::prep::{PrepError, Result};
use image::GrayImage;
use ndarray::{ArrayD, Axis, Ix2};
use std::fs;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct Snapshot {
    /// 输入的NIfTI文件。
    #[arg(long, short = 'i')]
    input: PathBuf,
    /// 输出的png文件。
    #[arg(long, short = 'o')]
    output: PathBuf,
    /// 轴位切片下标；缺省为中间切片。
    #[arg(long)]
    slice: Option<usize>,
}

impl Snapshot {
    pub fn run(&mut self) -> std::result::Result<(), CliError> {
        let (_, volume) = read_volume(&self.input)?;
        let png = render_axial_slice(&volume, self.slice)?;
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(PrepError::Io)?;
        }
        png.save(&self.output)?;
        info!("切片已保存到`{}`", self.output.display());
        Ok(())
    }
}

/// 取出第`z`个轴位切片（四维数据取第0帧），按切片内最小值到最大值线性映射到\[0, 255\]。
/// png的宽对应x轴，高对应y轴。
fn render_axial_slice(volume: &ArrayD<f32>, z: Option<usize>) -> Result<GrayImage> {
    if volume.ndim() < 3 {
        return Err(PrepError::invalid_input(format!(
            "expected a 3D or 4D volume, got {}D",
            volume.ndim()
        )));
    }
    if volume.ndim() > 3 && volume.shape()[3] == 0 {
        return Err(PrepError::invalid_input("4D volume has no frames"));
    }
    let mut view = volume.view();
    while view.ndim() > 3 {
        view = view.index_axis_move(Axis(3), 0);
    }
    let nz = view.shape()[2];
    let z = z.unwrap_or(nz / 2);
    if z >= nz {
        return Err(PrepError::invalid_argument(format!(
            "slice {z} out of range (volume has {nz} axial slices)"
        )));
    }
    let slice = view.index_axis_move(Axis(2), z).into_dimensionality::<Ix2>()?;
    let (nx, ny) = slice.dim();

    let (lower, upper) = slice
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let scale = if upper > lower {
        255.0 / (upper - lower)
    } else {
        0.0
    };

    let mut png = GrayImage::new(nx as u32, ny as u32);
    for ((x, y), &v) in slice.indexed_iter() {
        let level = ((v - lower) * scale).round().clamp(0.0, 255.0) as u8;
        png.put_pixel(x as u32, y as u32, image::Luma([level]));
    }
    Ok(png)
}
