//! 流程配置。构造一次之后只读。

use super::error::{PrepError, Result};
use super::motion::{ThresholdMethod, DEFAULT_RADIUS_MM};
use super::volume::DEFAULT_MASK_THRESHOLD;
use json::JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

/// 整个预处理流程共享的路径与数值参数。
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    subject_id: String,
    base_dir: PathBuf,
    output_dir: PathBuf,
    bet_frac: f64,
    bet_grad: f64,
    mask_threshold: f32,
    fd_radius_mm: f64,
    fd_method: ThresholdMethod,
    smooth_fwhm: f64,
    dof: u32,
    n_classes: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            subject_id: "101410".to_owned(),
            base_dir: PathBuf::from("./"),
            output_dir: PathBuf::from("./output"),
            bet_frac: 0.2,
            bet_grad: -0.1,
            mask_threshold: DEFAULT_MASK_THRESHOLD,
            fd_radius_mm: DEFAULT_RADIUS_MM,
            fd_method: ThresholdMethod::Iqr,
            smooth_fwhm: 6.0,
            dof: 6,
            n_classes: 3,
        }
    }
}

impl PipelineConfig {
    /// 从默认值出发构建配置。
    #[inline]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            config: PipelineConfig::default(),
        }
    }

    #[inline]
    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    #[inline]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[inline]
    pub fn bet_frac(&self) -> f64 {
        self.bet_frac
    }

    #[inline]
    pub fn bet_grad(&self) -> f64 {
        self.bet_grad
    }

    #[inline]
    pub fn mask_threshold(&self) -> f32 {
        self.mask_threshold
    }

    #[inline]
    pub fn fd_radius_mm(&self) -> f64 {
        self.fd_radius_mm
    }

    #[inline]
    pub fn fd_method(&self) -> ThresholdMethod {
        self.fd_method
    }

    #[inline]
    pub fn smooth_fwhm(&self) -> f64 {
        self.smooth_fwhm
    }

    #[inline]
    pub fn dof(&self) -> u32 {
        self.dof
    }

    #[inline]
    pub fn n_classes(&self) -> u32 {
        self.n_classes
    }

    /// `<base>/subject<id>`
    pub fn subject_dir(&self) -> PathBuf {
        self.base_dir.join(format!("subject{}", self.subject_id))
    }

    pub fn t1w_path(&self) -> PathBuf {
        let mut p = self.subject_dir();
        p.extend(["T1w", "T1w.nii.gz"]);
        p
    }

    pub fn run1_path(&self) -> PathBuf {
        let mut p = self.subject_dir();
        p.extend(["fMRI", "tfMRI_MOTOR_LR", "tfMRI_MOTOR_LR.nii"]);
        p
    }

    pub fn run2_path(&self) -> PathBuf {
        let mut p = self.subject_dir();
        p.extend(["fMRI", "tfMRI_MOTOR_RL", "tfMRI_MOTOR_RL.nii"]);
        p
    }

    /// 结构像衍生数据（去颅骨、分割）所在目录。
    pub fn derivatives_dir(&self) -> PathBuf {
        let mut p = self.base_dir.clone();
        p.extend(["derivatives", "preprocessed_data"]);
        p.push(format!("subject{}", self.subject_id));
        p
    }

    /// 去颅骨后的T1像。
    pub fn t1w_brain_path(&self) -> PathBuf {
        self.derivatives_dir().join("T1w_brain.nii.gz")
    }

    /// 三类分割中的白质部分容积图，用作BBR配准的白质分割。
    pub fn wm_seg_path(&self) -> PathBuf {
        self.derivatives_dir().join("T1w_fast_pve_2.nii.gz")
    }

    pub fn concat_path(&self) -> PathBuf {
        self.output_dir.join("fMRI_motor_concat_var1.nii.gz")
    }

    pub fn moco_dir(&self) -> PathBuf {
        self.output_dir.join("moco_mot_corr")
    }

    pub fn moco_path(&self) -> PathBuf {
        self.moco_dir().join("moco.nii.gz")
    }

    pub fn moco_par_path(&self) -> PathBuf {
        self.moco_dir().join("moco.par")
    }

    pub fn coreg_dir(&self) -> PathBuf {
        self.output_dir.join("coreg")
    }

    pub fn middle_volume_path(&self) -> PathBuf {
        self.coreg_dir().join("moco_vol_middle.nii.gz")
    }

    pub fn coreg_output_path(&self) -> PathBuf {
        self.coreg_dir().join("moco_vol_bbr.nii.gz")
    }

    pub fn smooth_dir(&self) -> PathBuf {
        self.output_dir.join("smoothed")
    }

    pub fn smooth_output_path(&self) -> PathBuf {
        self.smooth_dir().join("moco_smooth.nii.gz")
    }

    fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: String) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(PrepError::Config(msg))
            }
        }
        check(
            self.bet_frac > 0.0 && self.bet_frac < 1.0,
            format!("`bet_frac` must be in (0, 1), got {}", self.bet_frac),
        )?;
        check(
            self.bet_grad > -1.0 && self.bet_grad < 1.0,
            format!("`bet_grad` must be in (-1, 1), got {}", self.bet_grad),
        )?;
        check(
            self.mask_threshold >= 0.0,
            format!("`mask_threshold` must be non-negative, got {}", self.mask_threshold),
        )?;
        check(
            self.fd_radius_mm > 0.0,
            format!("`fd_radius_mm` must be positive, got {}", self.fd_radius_mm),
        )?;
        check(
            self.smooth_fwhm > 0.0,
            format!("`smooth_fwhm` must be positive, got {}", self.smooth_fwhm),
        )?;
        check(
            matches!(self.dof, 6 | 7 | 9 | 12),
            format!("`dof` must be one of 6, 7, 9, 12, got {}", self.dof),
        )?;
        check(
            self.n_classes >= 3,
            format!(
                "`n_classes` must be at least 3 so that white matter is class 2, got {}",
                self.n_classes
            ),
        )?;
        check(
            !self.subject_id.is_empty(),
            "`subject_id` must not be empty".to_owned(),
        )
    }
}

/// `PipelineConfig`的构建器；`build`时统一校验。
#[derive(Clone, Debug)]
pub struct ConfigBuilder {
    config: PipelineConfig,
}

impl ConfigBuilder {
    /// 用JSON文件中出现的键覆盖当前值。未知键或类型错误均视为配置错误。
    pub fn json_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PrepError::MissingInput(vec![path.to_path_buf()]));
        }
        let text = fs::read_to_string(path)?;
        self.json_str(&text)
    }

    pub fn json_str(mut self, text: &str) -> Result<Self> {
        let root = json::parse(text)
            .map_err(|e| PrepError::config(format!("malformed JSON: {e}")))?;
        if !root.is_object() {
            return Err(PrepError::config("top-level JSON value must be an object"));
        }
        let c = &mut self.config;
        for (key, value) in root.entries() {
            match key {
                "subject_id" => c.subject_id = json_string(key, value)?,
                "base_dir" => c.base_dir = json_string(key, value)?.into(),
                "output_dir" => c.output_dir = json_string(key, value)?.into(),
                "bet_frac" => c.bet_frac = json_f64(key, value)?,
                "bet_grad" => c.bet_grad = json_f64(key, value)?,
                "mask_threshold" => c.mask_threshold = json_f64(key, value)? as f32,
                "fd_radius_mm" => c.fd_radius_mm = json_f64(key, value)?,
                "smooth_fwhm" => c.smooth_fwhm = json_f64(key, value)?,
                "fd_method" => c.fd_method = json_string(key, value)?.parse()?,
                "dof" => c.dof = json_u32(key, value)?,
                "n_classes" => c.n_classes = json_u32(key, value)?,
                other => return Err(PrepError::config(format!("unknown key `{other}`"))),
            }
        }
        Ok(self)
    }

    #[inline]
    pub fn subject_id(mut self, id: impl Into<String>) -> Self {
        self.config.subject_id = id.into();
        self
    }

    #[inline]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.base_dir = dir.into();
        self
    }

    #[inline]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    #[inline]
    pub fn fd_method(mut self, method: ThresholdMethod) -> Self {
        self.config.fd_method = method;
        self
    }

    #[inline]
    pub fn fd_radius_mm(mut self, radius: f64) -> Self {
        self.config.fd_radius_mm = radius;
        self
    }

    #[inline]
    pub fn smooth_fwhm(mut self, fwhm: f64) -> Self {
        self.config.smooth_fwhm = fwhm;
        self
    }

    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn json_string(key: &str, v: &JsonValue) -> Result<String> {
    v.as_str()
        .map(str::to_owned)
        .ok_or_else(|| PrepError::config(format!("`{key}` must be a string")))
}

fn json_f64(key: &str, v: &JsonValue) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| PrepError::config(format!("`{key}` must be a number")))
}

fn json_u32(key: &str, v: &JsonValue) -> Result<u32> {
    v.as_u32()
        .ok_or_else(|| PrepError::config(format!("`{key}` must be a non-negative integer")))
}
