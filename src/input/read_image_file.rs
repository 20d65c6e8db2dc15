// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::time::Instant;

use image::ImageReader;
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{Frame, RgbFrame},
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
}

impl From<std::io::Error> for ImageFileInputError {
  fn from(err: std::io::Error) -> Self {
    ImageFileInputError::IoError(err)
  }
}

impl From<image::ImageError> for ImageFileInputError {
  fn from(err: image::ImageError) -> Self {
    ImageFileInputError::ImageLoadError(err)
  }
}

/// 图像文件输入。
/// 每次采集重新读取文件，返回的是文件当前内容对应的最新帧。
pub struct ImageFileInput {
  path: String,
  frame_index: u64,
  start_time: Instant,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    Ok(ImageFileInput {
      path: url.path().to_string(),
      frame_index: 0,
      start_time: Instant::now(),
    })
  }
}

impl ImageFileInput {
  pub fn capture(&mut self) -> Result<Frame, ImageFileInputError> {
    let image = ImageReader::open(&self.path)?.decode()?;
    let image: RgbFrame = image.to_rgb8().into();

    let frame = Frame::new(
      image,
      self.frame_index,
      self.start_time.elapsed().as_millis() as u64,
    );
    self.frame_index += 1;
    Ok(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_wrong_scheme() {
    let url = Url::parse("folder:///tmp/a.png").unwrap();
    let err = ImageFileInput::from_url(&url).unwrap_err();
    assert!(matches!(err, ImageFileInputError::SchemaMismatch));
  }

  #[test]
  fn capture_reads_current_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
      .save(&path)
      .unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();

    let frame = input.capture().unwrap();
    assert_eq!(frame.image.dimensions(), (4, 4));
    assert_eq!(frame.index, 0);
    assert_eq!(&frame.image.as_raw()[..3], &[10, 20, 30]);

    // 文件被替换后，下一次采集返回新内容
    image::RgbImage::from_pixel(4, 4, image::Rgb([200, 0, 0]))
      .save(&path)
      .unwrap();
    let frame = input.capture().unwrap();
    assert_eq!(frame.index, 1);
    assert_eq!(&frame.image.as_raw()[..3], &[200, 0, 0]);
  }

  #[test]
  fn capture_of_missing_file_is_an_error() {
    let url = Url::parse("image:///definitely/not/here.png").unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert!(matches!(
      input.capture(),
      Err(ImageFileInputError::IoError(_))
    ));
  }
}
