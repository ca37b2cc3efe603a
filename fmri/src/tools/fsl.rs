//! FSL命令行工具的参数模板。每个函数的参数与对应工具的命令行逐项对应。

use super::{invoke, nifti_stem, parent_dir, with_suffix, ToolCommand, ToolRunner, ToolStep};
use crate::prep::error::{PrepError, Result};
use crate::prep::nifti_io;
use std::path::{Path, PathBuf};
use tracing::info;

/// FWHM与高斯核标准差之比（2√(2ln2)，取FSL惯用的近似值）。
pub const FWHM_TO_SIGMA: f64 = 2.355;

/// 由半高全宽换算高斯核标准差。
#[inline]
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / FWHM_TO_SIGMA
}

#[inline]
fn fmt_num(v: f64) -> String {
    format!("{v}")
}

/// `bet`的输出。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkullStripOutputs {
    pub brain: PathBuf,
    pub mask: PathBuf,
}

/// `bet <in> <out>/T1w_brain -f <frac> -g <grad> -m -R`
pub fn skull_strip<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output_dir: &Path,
    frac: f64,
    grad: f64,
) -> Result<SkullStripOutputs> {
    let stem = output_dir.join("T1w_brain");
    let brain = with_suffix(&stem, ".nii.gz");
    let mask = with_suffix(&stem, "_mask.nii.gz");
    let command = ToolCommand::new("bet")
        .arg(input)
        .arg(&stem)
        .arg("-f")
        .arg(fmt_num(frac))
        .arg("-g")
        .arg(fmt_num(grad))
        .arg("-m")
        .arg("-R");
    info!("去颅骨 (bet, f = {frac}, g = {grad})...");
    invoke(
        runner,
        ToolStep {
            inputs: vec![input.to_path_buf()],
            output_dir: output_dir.to_path_buf(),
            command,
            outputs: vec![brain.clone(), mask.clone()],
        },
    )?;
    info!("\t脑: `{}`\n\t掩膜: `{}`", brain.display(), mask.display());
    Ok(SkullStripOutputs { brain, mask })
}

/// `fast`的输出。`pve[i]`为第`i`类组织的部分容积图；三类时依次为CSF、灰质、白质。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentationOutputs {
    pub pve: Vec<PathBuf>,
}

/// `fast --out=<out>/T1w_fast --class=<n> <brain>`
pub fn segment_tissues<R: ToolRunner + ?Sized>(
    runner: &R,
    brain: &Path,
    output_dir: &Path,
    n_classes: u32,
) -> Result<SegmentationOutputs> {
    let prefix = output_dir.join("T1w_fast");
    let pve: Vec<PathBuf> = (0..n_classes)
        .map(|i| with_suffix(&prefix, &format!("_pve_{i}.nii.gz")))
        .collect();
    let command = ToolCommand::new("fast")
        .kv_arg("--out", &prefix)
        .kv_arg("--class", n_classes.to_string())
        .arg(brain);
    info!("组织分割 (fast, {n_classes}类)...");
    invoke(
        runner,
        ToolStep {
            inputs: vec![brain.to_path_buf()],
            output_dir: output_dir.to_path_buf(),
            command,
            outputs: pve.clone(),
        },
    )?;
    for p in pve.iter() {
        info!("\t`{}`", p.display());
    }
    Ok(SegmentationOutputs { pve })
}

/// `mcflirt`的输出。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MotionCorrectionOutputs {
    pub corrected: PathBuf,
    pub params: PathBuf,
}

/// `mcflirt -in <in> -out <out>/moco -plots -report -dof <dof> -mats`
pub fn motion_correct<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output_dir: &Path,
    dof: u32,
) -> Result<MotionCorrectionOutputs> {
    let stem = output_dir.join("moco");
    let corrected = with_suffix(&stem, ".nii.gz");
    let params = with_suffix(&stem, ".par");
    let command = ToolCommand::new("mcflirt")
        .arg("-in")
        .arg(input)
        .arg("-out")
        .arg(&stem)
        .arg("-plots")
        .arg("-report")
        .arg("-dof")
        .arg(dof.to_string())
        .arg("-mats");
    info!("头动校正 (mcflirt, dof = {dof})...");
    invoke(
        runner,
        ToolStep {
            inputs: vec![input.to_path_buf()],
            output_dir: output_dir.to_path_buf(),
            command,
            outputs: vec![corrected.clone(), params.clone()],
        },
    )?;
    info!(
        "\t校正后数据: `{}`\n\t运动参数: `{}`",
        corrected.display(),
        params.display()
    );
    Ok(MotionCorrectionOutputs { corrected, params })
}

/// `fslroi <in> <out> <index> 1`：取出第`index`帧。
pub fn extract_volume<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    index: usize,
) -> Result<PathBuf> {
    let command = ToolCommand::new("fslroi")
        .arg(input)
        .arg(output)
        .arg(index.to_string())
        .arg("1");
    invoke(
        runner,
        ToolStep {
            inputs: vec![input.to_path_buf()],
            output_dir: parent_dir(output),
            command,
            outputs: vec![output.to_path_buf()],
        },
    )?;
    Ok(output.to_path_buf())
}

/// 取出中间帧（下标`frames / 2`）。`frames`为`None`时从输入文件的头信息读取。
pub fn extract_middle_volume<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    frames: Option<usize>,
) -> Result<PathBuf> {
    let frames = match frames {
        Some(n) => n,
        None => nifti_io::frame_count(input)?,
    };
    if frames == 0 {
        return Err(PrepError::invalid_input(format!(
            "`{}` has no frames",
            input.display()
        )));
    }
    let index = frames / 2;
    info!("提取中间帧 (下标 {index}, 共 {frames} 帧)...");
    extract_volume(runner, input, output, index)
}

/// `epi_reg`的输出。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoregOutputs {
    pub registered: PathBuf,
    pub matrix: PathBuf,
}

/// `epi_reg --epi=<epi> --t1=<t1> --t1brain=<t1brain> --out=<stem> --wmseg=<wmseg>`
///
/// `output`可带或不带`.nii.gz`扩展名；`epi_reg`总是以去掉扩展名后的路径为前缀生成结果。
pub fn coregister_epi<R: ToolRunner + ?Sized>(
    runner: &R,
    epi: &Path,
    t1: &Path,
    t1_brain: &Path,
    wm_seg: &Path,
    output: &Path,
) -> Result<CoregOutputs> {
    let stem = nifti_stem(output);
    let registered = with_suffix(&stem, ".nii.gz");
    let matrix = with_suffix(&stem, ".mat");
    let command = ToolCommand::new("epi_reg")
        .kv_arg("--epi", epi)
        .kv_arg("--t1", t1)
        .kv_arg("--t1brain", t1_brain)
        .kv_arg("--out", &stem)
        .kv_arg("--wmseg", wm_seg);
    info!("配准 (epi_reg, BBR)...");
    invoke(
        runner,
        ToolStep {
            inputs: vec![
                epi.to_path_buf(),
                t1.to_path_buf(),
                t1_brain.to_path_buf(),
                wm_seg.to_path_buf(),
            ],
            output_dir: parent_dir(&stem),
            command,
            outputs: vec![registered.clone(), matrix.clone()],
        },
    )?;
    info!("\t配准结果: `{}`", registered.display());
    Ok(CoregOutputs { registered, matrix })
}

/// `fslmaths <in> -s <sigma> <out>`，`sigma = fwhm / 2.355`。
pub fn smooth<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    output: &Path,
    fwhm: f64,
) -> Result<PathBuf> {
    if fwhm.is_nan() || fwhm <= 0.0 {
        return Err(PrepError::invalid_input(format!(
            "FWHM must be positive, got {fwhm}"
        )));
    }
    let sigma = fwhm_to_sigma(fwhm);
    let command = ToolCommand::new("fslmaths")
        .arg(input)
        .arg("-s")
        .arg(fmt_num(sigma))
        .arg(output);
    info!("高斯平滑 (FWHM = {fwhm} mm, sigma = {sigma:.3} mm)...");
    invoke(
        runner,
        ToolStep {
            inputs: vec![input.to_path_buf()],
            output_dir: parent_dir(output),
            command,
            outputs: vec![output.to_path_buf()],
        },
    )?;
    info!("\t平滑结果: `{}`", output.display());
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::super::testing::RecordingRunner;
    use super::super::ToolStatus;
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(p) = path.parent() {
            fs::create_dir_all(p).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_bet_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = dir.path().join("T1w.nii.gz");
        touch(&t1);
        let out = dir.path().join("deriv");
        let runner = RecordingRunner::ok();
        let res = skull_strip(&runner, &t1, &out, 0.2, -0.1).unwrap();
        assert_eq!(res.brain, out.join("T1w_brain.nii.gz"));
        assert_eq!(res.mask, out.join("T1w_brain_mask.nii.gz"));
        assert_eq!(
            runner.last_line(),
            format!(
                "bet {} {} -f 0.2 -g -0.1 -m -R",
                t1.display(),
                out.join("T1w_brain").display()
            )
        );
    }

    #[test]
    fn test_fast_arguments_and_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let brain = dir.path().join("T1w_brain.nii.gz");
        touch(&brain);
        let runner = RecordingRunner::ok();
        let res = segment_tissues(&runner, &brain, dir.path(), 3).unwrap();
        assert_eq!(res.pve.len(), 3);
        assert_eq!(res.pve[2], dir.path().join("T1w_fast_pve_2.nii.gz"));
        assert_eq!(
            runner.last_line(),
            format!(
                "fast --out={} --class=3 {}",
                dir.path().join("T1w_fast").display(),
                brain.display()
            )
        );
    }

    #[test]
    fn test_mcflirt_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("concat.nii.gz");
        touch(&input);
        let out = dir.path().join("moco_mot_corr");
        let runner = RecordingRunner::ok();
        let res = motion_correct(&runner, &input, &out, 6).unwrap();
        assert_eq!(res.corrected, out.join("moco.nii.gz"));
        assert_eq!(res.params, out.join("moco.par"));
        assert_eq!(
            runner.last_line(),
            format!(
                "mcflirt -in {} -out {} -plots -report -dof 6 -mats",
                input.display(),
                out.join("moco").display()
            )
        );
    }

    #[test]
    fn test_middle_volume_index() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("moco.nii.gz");
        touch(&input);
        let output = dir.path().join("coreg").join("mid.nii.gz");
        let runner = RecordingRunner::ok();
        extract_middle_volume(&runner, &input, &output, Some(568)).unwrap();
        assert!(runner.last_line().ends_with(" 284 1"));
        assert!(dir.path().join("coreg").is_dir());
    }

    #[test]
    fn test_middle_volume_from_header() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("series.nii");
        let data = ndarray::Array4::<f32>::zeros((2, 2, 2, 7));
        nifti_io::write_volume(&input, &data, None).unwrap();
        let runner = RecordingRunner::ok();
        extract_middle_volume(&runner, &input, &dir.path().join("mid.nii.gz"), None).unwrap();
        assert!(runner.last_line().ends_with(" 3 1"));
    }

    #[test]
    fn test_epi_reg_checks_every_input() {
        let dir = tempfile::tempdir().unwrap();
        let epi = dir.path().join("mid.nii.gz");
        let t1 = dir.path().join("T1w.nii.gz");
        let t1_brain = dir.path().join("T1w_brain.nii.gz");
        let wm = dir.path().join("T1w_fast_pve_2.nii.gz");
        touch(&epi);
        touch(&t1);
        let runner = RecordingRunner::ok();
        let out = dir.path().join("coreg").join("moco_vol_bbr.nii.gz");
        match coregister_epi(&runner, &epi, &t1, &t1_brain, &wm, &out) {
            Err(PrepError::MissingInput(missing)) => {
                assert_eq!(missing, vec![t1_brain.clone(), wm.clone()])
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(runner.calls.borrow().is_empty());

        touch(&t1_brain);
        touch(&wm);
        let res = coregister_epi(&runner, &epi, &t1, &t1_brain, &wm, &out).unwrap();
        let stem = dir.path().join("coreg").join("moco_vol_bbr");
        assert_eq!(res.registered, out);
        assert_eq!(res.matrix, with_suffix(&stem, ".mat"));
        assert_eq!(
            runner.last_line(),
            format!(
                "epi_reg --epi={} --t1={} --t1brain={} --out={} --wmseg={}",
                epi.display(),
                t1.display(),
                t1_brain.display(),
                stem.display(),
                wm.display()
            )
        );
    }

    #[test]
    fn test_smooth_sigma() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("moco.nii.gz");
        touch(&input);
        let output = dir.path().join("smoothed").join("moco_smooth.nii.gz");
        let runner = RecordingRunner::ok();
        smooth(&runner, &input, &output, FWHM_TO_SIGMA).unwrap();
        assert_eq!(
            runner.last_line(),
            format!("fslmaths {} -s 1 {}", input.display(), output.display())
        );
        assert!((fwhm_to_sigma(6.0) - 2.547_770_700_636_942_6).abs() < 1e-12);
    }

    #[test]
    fn test_smooth_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("moco.nii.gz");
        touch(&input);
        let runner = RecordingRunner::with_status(ToolStatus::Exited(1), "Image Exception : #22");
        let err = smooth(&runner, &input, &dir.path().join("s.nii.gz"), 6.0).unwrap_err();
        assert!(matches!(err, PrepError::ToolFailed { ref stderr, .. } if stderr.contains("#22")));
    }
}
