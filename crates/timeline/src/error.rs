//! Timeline 错误类型

use thiserror::Error;

/// Timeline 错误
#[derive(Debug, Error)]
pub enum TimelineError {
    /// 容量为 0
    #[error("timeline '{name}' needs a non-zero capacity")]
    ZeroCapacity {
        /// 时间线名称
        name: String,
    },

    /// 帧几何无效
    #[error("timeline '{name}' has invalid geometry: {message}")]
    InvalidGeometry {
        /// 时间线名称
        name: String,
        /// 错误消息
        message: String,
    },

    /// 元素索引越界
    #[error("element {index} out of range for timeline '{name}' (max {max_elements})")]
    ElementOutOfRange {
        /// 时间线名称
        name: String,
        /// 元素索引
        index: usize,
        /// 最大元素数
        max_elements: usize,
    },

    /// 元素字节数不匹配
    #[error("element size mismatch for timeline '{name}': expected {expected}, got {actual}")]
    ElementSizeMismatch {
        /// 时间线名称
        name: String,
        /// 期望字节数
        expected: usize,
        /// 实际字节数
        actual: usize,
    },
}

/// Timeline Result 类型别名
pub type Result<T> = std::result::Result<T, TimelineError>;
