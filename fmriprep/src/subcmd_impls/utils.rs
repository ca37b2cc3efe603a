use clap::Args;
use fmri::prep::config::ConfigBuilder;
use fmri::prep::{PipelineConfig, Result, ThresholdMethod};
use std::path::PathBuf;

/// 所有阶段共享的配置参数。命令行参数优先于配置文件，配置文件优先于默认值。
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// JSON配置文件。
    #[arg(long = "config", short = 'c')]
    config: Option<PathBuf>,
    /// 数据集根目录（包含`subject<ID>`目录）。
    #[arg(long = "base-dir", short = 'D')]
    base_dir: Option<PathBuf>,
    /// 输出根目录。
    #[arg(long = "output-dir", short = 'O')]
    output_dir: Option<PathBuf>,
    /// 被试编号。
    #[arg(long = "subject", short = 's')]
    subject: Option<String>,
}

impl ConfigArgs {
    /// 合并配置文件与命令行参数，返回尚未校验的构建器。
    pub fn builder(&self) -> Result<ConfigBuilder> {
        let mut builder = PipelineConfig::builder();
        if let Some(ref path) = self.config {
            builder = builder.json_file(path)?;
        }
        if let Some(ref dir) = self.base_dir {
            builder = builder.base_dir(dir.clone());
        }
        if let Some(ref dir) = self.output_dir {
            builder = builder.output_dir(dir.clone());
        }
        if let Some(ref id) = self.subject {
            builder = builder.subject_id(id.clone());
        }
        Ok(builder)
    }

    #[inline]
    pub fn load(&self) -> Result<PipelineConfig> {
        self.builder()?.build()
    }
}

pub fn threshold_method(s: &str) -> std::result::Result<ThresholdMethod, String> {
    s.parse::<ThresholdMethod>().map_err(|e| e.to_string())
}

pub fn positive_mm(s: &str) -> std::result::Result<f64, String> {
    let v: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a legal length in mm"))?;
    if v.is_nan() || v.is_infinite() || v <= 0.0 {
        return Err(format!("length must be a positive number of mm, but got `{s}`"));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_method_parser() {
        assert!(threshold_method("iqr").is_ok());
        assert!(threshold_method("median").is_ok());
        assert!(threshold_method("zscore").is_err());
    }

    #[test]
    fn test_positive_mm() {
        assert_eq!(positive_mm("6"), Ok(6.0));
        assert!(positive_mm("0").is_err());
        assert!(positive_mm("-3").is_err());
        assert!(positive_mm("inf").is_err());
        assert!(positive_mm("abc").is_err());
    }
}
