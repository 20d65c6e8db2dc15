// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/frame.rs - RGB 帧定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

const RGB_CHANNELS: usize = 3;

/// RGB 帧（HWC 排列，每通道 8 位）
#[derive(Debug, Clone)]
pub struct RgbFrame {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbFrame {
  /// 创建指定尺寸的全零帧
  pub fn with_shape(width: u32, height: u32) -> Self {
    let size = RGB_CHANNELS * (width as usize) * (height as usize);
    let data = vec![0u8; size].into_boxed_slice();
    Self {
      width,
      height,
      data,
    }
  }

  /// 从原始 HWC 字节数据创建帧
  pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Self {
    let expected = RGB_CHANNELS * (width as usize) * (height as usize);
    if data.len() != expected {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      );
    }

    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// 像素位置总数（不含通道）
  pub fn pixel_count(&self) -> usize {
    (self.width as usize) * (self.height as usize)
  }

  pub fn as_raw(&self) -> &[u8] {
    &self.data
  }
}

impl AsMut<[u8]> for RgbFrame {
  fn as_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }
}

#[cfg(feature = "image")]
impl From<image::RgbImage> for RgbFrame {
  fn from(image: image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    RgbFrame::from_raw(width, height, image.into_raw())
  }
}

#[cfg(feature = "image")]
impl RgbFrame {
  pub fn to_rgb_image(&self) -> image::RgbImage {
    image::RgbImage::from_raw(self.width, self.height, self.data.to_vec())
      .expect("帧数据长度与尺寸不一致")
  }
}

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbFrame,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbFrame, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }
}
