//! 输出槽 - 同步结果写入的目标容器
//!
//! 同步器只通过 [`FrameOutput`] / [`MatrixOutput`] 写入数据，
//! "modified" 通知是输出容器自身的能力，不属于同步事件。

use std::fmt;
use std::sync::Arc;

use nalgebra::Matrix4;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{ComponentType, ContractError, FrameGeometry, TimelinePixelFormat, Timestamp};

/// "modified" 通知回调
pub type ModifiedCallback = Arc<dyn Fn() + Send + Sync>;

/// 共享帧输出句柄
pub type SharedFrameOutput = Arc<Mutex<dyn FrameOutput>>;

/// 共享矩阵输出句柄
pub type SharedMatrixOutput = Arc<Mutex<dyn MatrixOutput>>;

/// 图像像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    GrayScale,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl TryFrom<TimelinePixelFormat> for PixelFormat {
    type Error = ContractError;

    fn try_from(format: TimelinePixelFormat) -> Result<Self, Self::Error> {
        match format {
            TimelinePixelFormat::GrayScale => Ok(PixelFormat::GrayScale),
            TimelinePixelFormat::Rgb => Ok(PixelFormat::Rgb),
            TimelinePixelFormat::Bgr => Ok(PixelFormat::Bgr),
            TimelinePixelFormat::Rgba => Ok(PixelFormat::Rgba),
            TimelinePixelFormat::Bgra => Ok(PixelFormat::Bgra),
            TimelinePixelFormat::Undefined => Err(ContractError::invalid_geometry(
                "pixel format is undefined",
            )),
        }
    }
}

/// 图像内存布局（尺寸 + 分量 + 像素格式）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub component_type: ComponentType,
    pub pixel_format: PixelFormat,
}

impl ImageLayout {
    /// 由时间线几何推导图像布局，未定义像素格式返回错误
    pub fn from_geometry(geometry: &FrameGeometry) -> Result<Self, ContractError> {
        Ok(Self {
            width: geometry.width,
            height: geometry.height,
            components: geometry.components,
            component_type: geometry.component_type,
            pixel_format: PixelFormat::try_from(geometry.pixel_format)?,
        })
    }

    /// 像素缓冲区字节数
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.components as usize
            * self.component_type.size()
    }
}

/// 帧输出能力
pub trait FrameOutput: Send {
    /// 当前布局，未分配时为 `None`
    fn layout(&self) -> Option<ImageLayout>;

    /// 按新布局重新分配像素缓冲区
    ///
    /// 同时重置 origin = (0,0,0)、spacing = (1,1,1)、窗宽 1、窗位 0。
    fn reallocate(&mut self, layout: ImageLayout);

    /// 拷贝像素数据，长度必须与布局一致
    fn write_pixels(&mut self, data: &[u8]) -> Result<(), ContractError>;

    /// 设置采集时间，不支持时返回 `false`
    fn set_acquisition_time(&mut self, _timestamp: Timestamp) -> bool {
        false
    }

    /// 通知观察者数据已修改
    fn notify_modified(&mut self);
}

/// 矩阵输出能力
pub trait MatrixOutput: Send {
    /// 按行优先顺序写入 16 个值
    fn set_values(&mut self, values: &[f32; 16]);

    /// 通知观察者数据已修改
    fn notify_modified(&mut self);
}

/// Listener list + modification counter shared by the concrete outputs
#[derive(Default)]
struct ModifiedSignal {
    listeners: Vec<ModifiedCallback>,
    count: u64,
}

impl ModifiedSignal {
    fn emit(&mut self) {
        self.count += 1;
        for listener in &self.listeners {
            listener();
        }
    }
}

impl fmt::Debug for ModifiedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModifiedSignal")
            .field("listeners", &self.listeners.len())
            .field("count", &self.count)
            .finish()
    }
}

/// 二维图像
#[derive(Debug)]
pub struct Image {
    layout: Option<ImageLayout>,
    pixels: Vec<u8>,
    origin: [f64; 3],
    spacing: [f64; 3],
    window_width: f64,
    window_center: f64,
    modified: ModifiedSignal,
}

impl Default for Image {
    fn default() -> Self {
        Self::new()
    }
}

impl Image {
    /// 创建未分配的图像
    pub fn new() -> Self {
        Self {
            layout: None,
            pixels: Vec::new(),
            origin: [0.0; 3],
            spacing: [1.0; 3],
            window_width: 1.0,
            window_center: 0.0,
            modified: ModifiedSignal::default(),
        }
    }

    /// 创建已按布局分配的图像
    pub fn with_layout(layout: ImageLayout) -> Self {
        let mut image = Self::new();
        image.reallocate(layout);
        image
    }

    /// 共享句柄
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    pub fn set_origin(&mut self, origin: [f64; 3]) {
        self.origin = origin;
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn set_spacing(&mut self, spacing: [f64; 3]) {
        self.spacing = spacing;
    }

    /// (窗宽, 窗位)
    pub fn window(&self) -> (f64, f64) {
        (self.window_width, self.window_center)
    }

    pub fn set_window(&mut self, width: f64, center: f64) {
        self.window_width = width;
        self.window_center = center;
    }

    /// 注册 "modified" 监听器
    pub fn on_modified(&mut self, callback: ModifiedCallback) {
        self.modified.listeners.push(callback);
    }

    /// 已发出的 "modified" 通知次数
    pub fn modified_count(&self) -> u64 {
        self.modified.count
    }
}

impl FrameOutput for Image {
    fn layout(&self) -> Option<ImageLayout> {
        self.layout
    }

    fn reallocate(&mut self, layout: ImageLayout) {
        self.pixels = vec![0; layout.byte_size()];
        self.layout = Some(layout);
        self.origin = [0.0; 3];
        self.spacing = [1.0; 3];
        self.window_width = 1.0;
        self.window_center = 0.0;
    }

    fn write_pixels(&mut self, data: &[u8]) -> Result<(), ContractError> {
        if self.layout.is_none() {
            return Err(ContractError::output_write("image is not allocated"));
        }
        if data.len() != self.pixels.len() {
            return Err(ContractError::output_write(format!(
                "pixel buffer size mismatch: expected {} bytes, got {}",
                self.pixels.len(),
                data.len()
            )));
        }
        self.pixels.copy_from_slice(data);
        Ok(())
    }

    fn notify_modified(&mut self) {
        self.modified.emit();
    }
}

/// 带采集时间的图像（图像序列中的一帧）
#[derive(Debug, Default)]
pub struct ImageSeries {
    image: Image,
    acquisition_time: Option<Timestamp>,
}

impl ImageSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// 共享句柄
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    pub fn acquisition_time(&self) -> Option<Timestamp> {
        self.acquisition_time
    }
}

impl FrameOutput for ImageSeries {
    fn layout(&self) -> Option<ImageLayout> {
        self.image.layout()
    }

    fn reallocate(&mut self, layout: ImageLayout) {
        self.image.reallocate(layout);
    }

    fn write_pixels(&mut self, data: &[u8]) -> Result<(), ContractError> {
        self.image.write_pixels(data)
    }

    fn set_acquisition_time(&mut self, timestamp: Timestamp) -> bool {
        self.acquisition_time = Some(timestamp);
        true
    }

    fn notify_modified(&mut self) {
        self.image.notify_modified();
    }
}

/// 4x4 刚体变换矩阵
#[derive(Debug)]
pub struct TransformMatrix {
    matrix: Matrix4<f64>,
    modified: ModifiedSignal,
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl TransformMatrix {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
            modified: ModifiedSignal::default(),
        }
    }

    /// 共享句柄
    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::identity()))
    }

    pub fn matrix(&self) -> &Matrix4<f64> {
        &self.matrix
    }

    /// 第 `row` 行第 `col` 列
    pub fn coefficient(&self, row: usize, col: usize) -> f64 {
        self.matrix[(row, col)]
    }

    /// 注册 "modified" 监听器
    pub fn on_modified(&mut self, callback: ModifiedCallback) {
        self.modified.listeners.push(callback);
    }

    /// 已发出的 "modified" 通知次数
    pub fn modified_count(&self) -> u64 {
        self.modified.count
    }
}

impl MatrixOutput for TransformMatrix {
    fn set_values(&mut self, values: &[f32; 16]) {
        let widened: Vec<f64> = values.iter().map(|&v| f64::from(v)).collect();
        self.matrix = Matrix4::from_row_slice(&widened);
    }

    fn notify_modified(&mut self) {
        self.modified.emit();
    }
}
