//! SessionBlueprint - Config Loader 输出
//!
//! 描述完整的会话配置：同步器参数 + 为每条时间线喂数据的 mock 数据源。

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ComponentType, FrameGeometry, SynchronizerConfig, TimelinePixelFormat};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的会话配置蓝图
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct SessionBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 同步器配置
    #[serde(default)]
    #[validate(nested)]
    pub synchronizer: SynchronizerConfig,

    /// 帧数据源，按帧时间线顺序一一对应
    #[serde(default)]
    #[validate(nested)]
    pub frame_sources: Vec<FrameSourceConfig>,

    /// 矩阵数据源，按矩阵时间线顺序一一对应
    #[serde(default)]
    #[validate(nested)]
    pub matrix_sources: Vec<MatrixSourceConfig>,
}

/// 数据源公共参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// 推送频率 (Hz)
    #[serde(default = "default_frequency_hz")]
    #[validate(range(exclusive_min = 0.0))]
    pub frequency_hz: f64,

    /// 时间戳滞后 (ms)
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub lag_ms: f64,

    /// 时间线保留的样本数
    #[serde(default = "default_capacity")]
    #[validate(range(min = 1))]
    pub capacity: usize,

    /// 每个缓冲区复用的元素数
    #[serde(default = "default_elements")]
    #[validate(range(min = 1))]
    pub elements: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frequency_hz: default_frequency_hz(),
            lag_ms: 0.0,
            capacity: default_capacity(),
            elements: default_elements(),
        }
    }
}

/// 帧数据源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FrameSourceConfig {
    #[serde(flatten)]
    #[validate(nested)]
    pub source: SourceConfig,

    #[serde(default = "default_width")]
    #[validate(range(min = 1))]
    pub width: u32,

    #[serde(default = "default_height")]
    #[validate(range(min = 1))]
    pub height: u32,

    #[serde(default = "default_components")]
    #[validate(range(min = 1))]
    pub components: u8,

    #[serde(default)]
    pub component_type: ComponentType,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: TimelinePixelFormat,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            width: default_width(),
            height: default_height(),
            components: default_components(),
            component_type: ComponentType::default(),
            pixel_format: default_pixel_format(),
        }
    }
}

impl FrameSourceConfig {
    /// 时间线几何
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry {
            width: self.width,
            height: self.height,
            components: self.components,
            component_type: self.component_type,
            pixel_format: self.pixel_format,
        }
    }
}

/// 矩阵数据源
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct MatrixSourceConfig {
    #[serde(flatten)]
    #[validate(nested)]
    pub source: SourceConfig,
}

fn default_frequency_hz() -> f64 {
    30.0
}

fn default_capacity() -> usize {
    64
}

fn default_elements() -> usize {
    1
}

fn default_width() -> u32 {
    64
}

fn default_height() -> u32 {
    48
}

fn default_components() -> u8 {
    1
}

fn default_pixel_format() -> TimelinePixelFormat {
    TimelinePixelFormat::GrayScale
}
