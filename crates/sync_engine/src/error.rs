//! Synchronizer 错误类型

use contracts::{ContractError, TimelineId, TimelineKind};
use thiserror::Error;

/// Synchronizer 错误
///
/// 运行时配置错误不会改变状态，组件保持可用。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 输出槽不存在
    #[error("unknown {kind} output slot {slot} ({declared} declared)")]
    UnknownSlot {
        kind: TimelineKind,
        slot: usize,
        declared: usize,
    },

    /// 时间线索引越界
    #[error("{timeline} is not declared (only {declared} of its kind)")]
    TimelineOutOfRange { timeline: TimelineId, declared: usize },

    /// 负延迟
    #[error("negative delay {value}ms rejected for {timeline}")]
    NegativeDelay { timeline: TimelineId, value: i64 },

    /// 无法识别的延迟参数键
    #[error("invalid delay key: {0}")]
    InvalidDelayKey(#[source] ContractError),

    /// 附加数量与声明不一致
    #[error("{kind} {what}: {attached} attached but {declared} declared")]
    AttachmentMismatch {
        kind: TimelineKind,
        what: &'static str,
        attached: usize,
        declared: usize,
    },

    /// 生命周期错误
    #[error("synchronizer cannot {action} while {state}")]
    Lifecycle {
        action: &'static str,
        state: &'static str,
    },

    /// 定时模式需要 tokio runtime
    #[error("timer dispatch requires a running tokio runtime")]
    NoRuntime,
}

/// Synchronizer Result 类型别名
pub type Result<T> = std::result::Result<T, SyncError>;
