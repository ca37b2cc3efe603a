use super::ToolStatus;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

/// 区分正常退出与被信号终止的进程。
pub(super) fn describe_status(status: &ExitStatus) -> ToolStatus {
    match (status.code(), status.signal()) {
        (Some(code), _) => ToolStatus::Exited(code),
        (None, Some(sig)) => ToolStatus::Signaled(sig),
        (None, None) => ToolStatus::Unknown,
    }
}
