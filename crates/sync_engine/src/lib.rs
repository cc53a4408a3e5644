//! # Sync Engine
//!
//! 多时间线同步引擎。
//!
//! 负责：
//! - 在所有时间线的最新样本中选出公共同步时刻（容差窗口）
//! - 按绑定表把对应元素写入帧/矩阵输出（支持每条时间线的延迟补偿）
//! - 边沿触发的输出槽同步状态通知
//! - 按请求或定时器两种方式调度同步
//!
//! ## 使用示例
//!
//! ```ignore
//! use contracts::{ImageSeries, SynchronizerConfig, TransformMatrix};
//! use sync_engine::Synchronizer;
//!
//! let sync = Synchronizer::builder(config)
//!     .frame_timeline(&video)
//!     .matrix_timeline(&tracker)
//!     .frame_output(ImageSeries::shared())
//!     .matrix_output(TransformMatrix::shared())
//!     .build()?;
//!
//! let mut events = sync.subscribe();
//! sync.start()?;
//! sync.request_synchronization();
//! ```

mod attachments;
mod binding;
mod delay;
mod dispatch;
mod engine;
mod error;
mod notify;
mod selector;
mod writer;

// Re-exports
pub use binding::{BindingTable, OutputBinding};
pub use delay::DelayTable;
pub use dispatch::{DispatchMode, DispatchState};
pub use engine::{SyncOutcome, Synchronizer, SynchronizerBuilder};
pub use error::{Result, SyncError};
pub use selector::{select, Candidate, InclusionSet, Selection};
