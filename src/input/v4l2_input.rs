// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/input/v4l2_input.rs - V4L2 摄像头输入源
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use thiserror::Error;
use tracing::error;
use url::Url;
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, RgbFrame},
};

#[derive(Error, Debug)]
pub enum V4l2InputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("捕获缓冲区大小不匹配")]
  BufferSizeMismatch,
}

/// V4L2 摄像头输入源。
///
/// 设备在构造时打开并设置采集格式；每次采集临时创建 mmap 流，
/// 读取一帧后立即释放，返回的始终是设备当前的最新帧。
pub struct V4l2Input {
  device: Device,
  width: u32,
  height: u32,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for V4l2Input {
  const SCHEME: &'static str = "v4l2";
}

impl FromUrl for V4l2Input {
  type Error = V4l2InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(V4l2InputError::SchemaMismatch);
    }

    // 预期格式: v4l2:///dev/video0
    let device_path = if url.path().is_empty() {
      "/dev/video0".to_string()
    } else {
      url.path().to_string()
    };

    let device = Device::with_path(&device_path)?;

    // 设置视频格式
    let mut format = device.format()?;
    format.width = 640;
    format.height = 480;
    format.fourcc = FourCC::new(b"YUYV");
    let format = device.set_format(&format)?;

    Ok(V4l2Input {
      device,
      width: format.width,
      height: format.height,
      frame_index: 0,
      start_time: Instant::now(),
    })
  }
}

impl V4l2Input {
  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn capture(&mut self) -> Result<Frame, V4l2InputError> {
    let mut stream = Stream::with_buffers(&self.device, Type::VideoCapture, 4)?;
    let (buffer, _meta) = stream.next()?;

    let rgb_data = yuyv_to_rgb(buffer);
    if rgb_data.len() != 3 * (self.width as usize) * (self.height as usize) {
      return Err(V4l2InputError::BufferSizeMismatch);
    }

    let frame = Frame::new(
      RgbFrame::from_raw(self.width, self.height, rgb_data),
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }
}

/// 将 YUYV 格式转换为 RGB
fn yuyv_to_rgb(yuyv: &[u8]) -> Vec<u8> {
  let mut rgb = Vec::with_capacity(yuyv.len() / 2 * 3);

  for chunk in yuyv.chunks(4) {
    if chunk.len() < 4 {
      break;
    }

    let y0 = chunk[0] as f32;
    let u = chunk[1] as f32 - 128.0;
    let y1 = chunk[2] as f32;
    let v = chunk[3] as f32 - 128.0;

    // 第一个像素
    let r = (y0 + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y0 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y0 + 1.772 * u).clamp(0.0, 255.0) as u8;
    rgb.extend_from_slice(&[r, g, b]);

    // 第二个像素
    let r = (y1 + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y1 - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y1 + 1.772 * u).clamp(0.0, 255.0) as u8;
    rgb.extend_from_slice(&[r, g, b]);
  }

  rgb
}
