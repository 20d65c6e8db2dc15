// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/service.rs - 变化检测服务
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
  config::ServiceConfig,
  detector::{DetectResult, Detector, PixelDiff, PixelDiffError},
  frame::Frame,
  input::{FrameSource, InputError},
};

#[derive(Error, Debug)]
pub enum ServiceError {
  #[error("采集错误: {0}")]
  Capture(#[from] InputError),
  #[error("检测错误: {0}")]
  Detector(#[from] PixelDiffError),
  #[error("输入源锁中毒")]
  SourcePoisoned,
}

/// 变化检测服务：组合帧来源与像素差异检测器。
///
/// 服务可被多个调用方并发使用；帧记忆的读写互斥由检测器内部保证，
/// 输入源的采集由服务内部串行化。
pub struct ChangeService<S> {
  detector: PixelDiff,
  source: Mutex<S>,
}

impl<S: FrameSource> ChangeService<S> {
  pub fn new(config: &ServiceConfig, source: S) -> Self {
    info!(
      "创建变化检测服务: 记忆容量 {}, 要求差异 {:.2}%, 输入相机 {}",
      config.image_memories,
      config.required_diff * 100.0,
      config.input_camera
    );
    Self {
      detector: PixelDiff::new(config),
      source: Mutex::new(source),
    }
  }

  /// 对调用方提供的帧执行一次变化检测
  pub fn detect_frame(&self, frame: &Frame) -> Result<DetectResult, ServiceError> {
    Ok(self.detector.detect(frame)?)
  }

  /// 从输入相机采集最新帧并执行变化检测。
  /// 采集失败直接返回错误，不改动帧记忆。
  pub fn get_detections(&self) -> Result<(Frame, DetectResult), ServiceError> {
    let frame = {
      let mut source = self.source.lock().map_err(|_| ServiceError::SourcePoisoned)?;
      source.capture()?
    };

    let result = self.detector.detect(&frame)?;
    Ok((frame, result))
  }

  /// 分类视图：与检测结果同构的标签/置信度序列
  pub fn get_classifications(&self, frame: &Frame) -> Result<DetectResult, ServiceError> {
    self.detect_frame(frame)
  }

  /// 管理命令入口。
  ///
  /// `targeted_memory_erasure` 无条件清空全部帧记忆并返回成功应答；
  /// 未知命令返回 status=error 的应答而不是调用失败。
  pub fn do_command(&self, command: &Value) -> Result<Value, ServiceError> {
    if command.get("targeted_memory_erasure").is_some() {
      self.detector.erase_memories()?;
      return Ok(json!({
        "status": "success",
        "message": "All image memories cleared",
      }));
    }

    warn!("未知命令: {}", command);
    Ok(json!({
      "status": "error",
      "message": "Unknown command",
    }))
  }

  pub fn memory_len(&self) -> Result<usize, ServiceError> {
    Ok(self.detector.memory_len()?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::RgbFrame;
  use crate::input::V4l2InputError;
  use std::collections::VecDeque;

  /// 按脚本逐次返回帧或采集错误的测试输入源
  struct ScriptedSource {
    steps: VecDeque<Result<Frame, InputError>>,
  }

  impl ScriptedSource {
    fn new(steps: Vec<Result<Frame, InputError>>) -> Self {
      Self {
        steps: steps.into_iter().collect(),
      }
    }
  }

  impl FrameSource for ScriptedSource {
    fn capture(&mut self) -> Result<Frame, InputError> {
      self
        .steps
        .pop_front()
        .unwrap_or(Err(InputError::SchemeMismatch))
    }
  }

  fn solid(index: u64, value: u8) -> Frame {
    let mut image = RgbFrame::with_shape(4, 4);
    image.as_mut().fill(value);
    Frame::new(image, index, index * 100)
  }

  fn capture_error() -> InputError {
    InputError::V4l2InputError(V4l2InputError::BufferSizeMismatch)
  }

  fn config() -> ServiceConfig {
    ServiceConfig::with_required_diff(5, "test-camera", 0.2).unwrap()
  }

  #[test]
  fn get_detections_captures_and_detects() {
    let source = ScriptedSource::new(vec![Ok(solid(1, 0)), Ok(solid(2, 3))]);
    let service = ChangeService::new(&config(), source);

    let (frame, result) = service.get_detections().unwrap();
    assert_eq!(frame.index, 1);
    assert!(!result.is_empty());

    // 第二帧与首帧几乎相同，被抑制
    let (_, result) = service.get_detections().unwrap();
    assert!(result.is_empty());
    assert_eq!(service.memory_len().unwrap(), 1);
  }

  #[test]
  fn capture_failure_surfaces_and_leaves_memory_untouched() {
    let source = ScriptedSource::new(vec![Err(capture_error()), Ok(solid(1, 0))]);
    let service = ChangeService::new(&config(), source);

    let err = service.get_detections().unwrap_err();
    assert!(matches!(err, ServiceError::Capture(_)));
    assert_eq!(service.memory_len().unwrap(), 0);

    // 下一次采集相互独立
    let (_, result) = service.get_detections().unwrap();
    assert!(!result.is_empty());
    assert_eq!(service.memory_len().unwrap(), 1);
  }

  #[test]
  fn memory_erasure_command_clears_and_acknowledges() {
    let source = ScriptedSource::new(vec![]);
    let service = ChangeService::new(&config(), source);
    service.detect_frame(&solid(1, 0)).unwrap();
    service.detect_frame(&solid(2, 100)).unwrap();
    assert_eq!(service.memory_len().unwrap(), 2);

    let command = json!({"targeted_memory_erasure": {}});
    let ack = service.do_command(&command).unwrap();
    assert_eq!(ack["status"], "success");
    assert_eq!(service.memory_len().unwrap(), 0);

    // 重复清空等价于一次清空
    let ack = service.do_command(&command).unwrap();
    assert_eq!(ack["status"], "success");
    assert_eq!(service.memory_len().unwrap(), 0);

    // 清空后的下一帧重新触发首帧检测
    let result = service.detect_frame(&solid(3, 0)).unwrap();
    assert!(!result.is_empty());
  }

  #[test]
  fn unknown_command_reports_error_status() {
    let source = ScriptedSource::new(vec![]);
    let service = ChangeService::new(&config(), source);

    let ack = service.do_command(&json!({"defragment": true})).unwrap();
    assert_eq!(ack["status"], "error");
  }

  #[test]
  fn classifications_mirror_detections() {
    let source = ScriptedSource::new(vec![]);
    let service = ChangeService::new(&config(), source);

    let result = service.get_classifications(&solid(1, 0)).unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].label, "significant_change");
  }
}
