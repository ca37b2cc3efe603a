use fmri::prep::PrepError;
use thiserror::Error;

/// 命令行层的错误：预处理库错误之外，还有png编码错误。
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Prep(#[from] PrepError),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prep_error_message_passes_through() {
        let e: CliError = PrepError::invalid_argument("bad method").into();
        assert_eq!(e.to_string(), "invalid argument: bad method");
    }
}
