// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/detector/pixel_diff.rs - 像素差异变化检测器
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::ServiceConfig,
  detector::{DetectItem, DetectResult, Detector, SIGNIFICANT_CHANGE_LABEL},
  frame::{Frame, RgbFrame},
  memory::FrameMemory,
};

/// 单像素容差：任一通道差值超过该值，该像素位置即计为不同。
/// 该常量直接决定差异比例的取值，跨实现必须保持一致。
pub const PIXEL_DIFF_TOLERANCE: u8 = 10;

#[derive(Error, Debug)]
pub enum PixelDiffError {
  #[error("帧记忆锁中毒")]
  MemoryPoisoned,
}

/// 计算两帧的差异比例：不同像素位置数 / 像素位置总数，取值 [0.0, 1.0]。
/// 尺寸不一致的两帧视为完全不同（比例 1.0），不作为错误处理。
pub fn diff_ratio(a: &RgbFrame, b: &RgbFrame) -> f32 {
  if a.dimensions() != b.dimensions() {
    return 1.0;
  }

  let total = a.pixel_count();
  if total == 0 {
    return 0.0;
  }

  let changed = a
    .as_raw()
    .chunks_exact(a.channels())
    .zip(b.as_raw().chunks_exact(b.channels()))
    .filter(|(pa, pb)| {
      pa.iter()
        .zip(pb.iter())
        .any(|(&ca, &cb)| ca.abs_diff(cb) > PIXEL_DIFF_TOLERANCE)
    })
    .count();

  changed as f32 / total as f32
}

/// 判定新帧是否与每一张记忆帧都达到要求的差异比例。
/// 阈值为闭界（差异等于阈值也算达到）；空记忆恒为真。
pub fn differs_from_all<'a>(
  image: &RgbFrame,
  memories: impl Iterator<Item = &'a Frame>,
  required_diff: f32,
) -> bool {
  for (i, memory) in memories.enumerate() {
    let diff = diff_ratio(image, &memory.image);
    debug!("与第 {} 张记忆帧差异比例: {:.2}%", i, diff * 100.0);
    if diff < required_diff {
      info!(
        "帧与第 {} 张记忆帧过于相似 (差异 {:.2}% < 要求 {:.2}%)",
        i,
        diff * 100.0,
        required_diff * 100.0
      );
      return false;
    }
  }
  true
}

/// 像素差异变化检测器。
///
/// 持有互斥保护的帧记忆；一次检测的「快照 → 比较 → 判定 → 写入」
/// 与记忆清空互斥，整体在同一临界区内完成。
pub struct PixelDiff {
  memory: Mutex<FrameMemory>,
  required_diff: f32,
}

impl PixelDiff {
  pub fn new(config: &ServiceConfig) -> Self {
    Self {
      memory: Mutex::new(FrameMemory::new(config.image_memories)),
      required_diff: config.required_diff,
    }
  }

  pub fn required_diff(&self) -> f32 {
    self.required_diff
  }

  /// 清空全部帧记忆，返回清除的帧数。对空记忆调用同样成功。
  pub fn erase_memories(&self) -> Result<usize, PixelDiffError> {
    let mut memory = self
      .memory
      .lock()
      .map_err(|_| PixelDiffError::MemoryPoisoned)?;
    let count = memory.len();
    memory.clear();
    info!("已清空 {} 张记忆帧", count);
    Ok(count)
  }

  pub fn memory_len(&self) -> Result<usize, PixelDiffError> {
    let memory = self
      .memory
      .lock()
      .map_err(|_| PixelDiffError::MemoryPoisoned)?;
    Ok(memory.len())
  }
}

impl Detector for PixelDiff {
  type Input = Frame;
  type Output = DetectResult;
  type Error = PixelDiffError;

  fn detect(&self, input: &Frame) -> Result<DetectResult, PixelDiffError> {
    let mut memory = self
      .memory
      .lock()
      .map_err(|_| PixelDiffError::MemoryPoisoned)?;

    if memory.is_empty() {
      info!("暂无记忆帧可比较，记录首帧并报告显著变化");
      memory.insert(input.clone());
      return Ok(significant_change());
    }

    if !differs_from_all(&input.image, memory.iter(), self.required_diff) {
      return Ok(DetectResult::empty());
    }

    memory.insert(input.clone());
    info!(
      "帧与所有记忆帧均显著不同，已记录 (要求差异 {:.2}%)",
      self.required_diff * 100.0
    );
    Ok(significant_change())
  }
}

fn significant_change() -> DetectResult {
  DetectResult {
    items: Box::new([DetectItem {
      label: SIGNIFICANT_CHANGE_LABEL,
      score: 1.0,
    }]),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn solid(index: u64, width: u32, height: u32, value: u8) -> Frame {
    let mut image = RgbFrame::with_shape(width, height);
    image.as_mut().fill(value);
    Frame::new(image, index, index * 100)
  }

  /// 4x4 帧，前 changed 个像素位置的红色通道偏离 0 超出容差
  fn partly_changed(index: u64, changed: usize) -> Frame {
    let mut image = RgbFrame::with_shape(4, 4);
    for p in 0..changed {
      image.as_mut()[p * 3] = 50;
    }
    Frame::new(image, index, index * 100)
  }

  fn detector(image_memories: usize, required_diff: f32) -> PixelDiff {
    let config =
      ServiceConfig::with_required_diff(image_memories, "test-camera", required_diff).unwrap();
    PixelDiff::new(&config)
  }

  #[test]
  fn diff_ratio_of_identical_frames_is_zero() {
    let a = solid(1, 4, 4, 128);
    let b = solid(2, 4, 4, 128);
    assert_eq!(diff_ratio(&a.image, &b.image), 0.0);
  }

  #[test]
  fn diff_within_tolerance_does_not_count() {
    let a = solid(1, 4, 4, 100);
    let b = solid(2, 4, 4, 100 + PIXEL_DIFF_TOLERANCE);
    assert_eq!(diff_ratio(&a.image, &b.image), 0.0);

    let c = solid(3, 4, 4, 100 + PIXEL_DIFF_TOLERANCE + 1);
    assert_eq!(diff_ratio(&a.image, &c.image), 1.0);
  }

  #[test]
  fn diff_ratio_counts_changed_pixel_fraction() {
    let base = solid(1, 4, 4, 0);
    let quarter = partly_changed(2, 4);
    assert_eq!(diff_ratio(&base.image, &quarter.image), 0.25);
  }

  #[test]
  fn mismatched_dimensions_are_maximally_different() {
    let a = solid(1, 4, 4, 0);
    let b = solid(2, 8, 8, 0);
    assert_eq!(diff_ratio(&a.image, &b.image), 1.0);
  }

  #[test]
  fn first_frame_bootstraps_memory_and_detects() {
    let detector = detector(5, 0.2);
    let result = detector.detect(&solid(1, 4, 4, 0)).unwrap();

    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].label, SIGNIFICANT_CHANGE_LABEL);
    assert_eq!(result.items[0].score, 1.0);
    assert_eq!(detector.memory_len().unwrap(), 1);
  }

  #[test]
  fn diff_equal_to_threshold_counts_as_significant() {
    let detector = detector(5, 0.25);
    detector.detect(&solid(1, 4, 4, 0)).unwrap();

    // 恰好 4/16 像素变化，与阈值 0.25 相等
    let result = detector.detect(&partly_changed(2, 4)).unwrap();
    assert!(!result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 2);
  }

  #[test]
  fn single_near_duplicate_suppresses_detection() {
    let detector = detector(5, 0.2);
    detector.detect(&solid(1, 4, 4, 0)).unwrap();
    detector.detect(&solid(2, 4, 4, 200)).unwrap();
    assert_eq!(detector.memory_len().unwrap(), 2);

    // 与第一张记忆帧几乎相同，与第二张完全不同：仍须抑制
    let result = detector.detect(&solid(3, 4, 4, 5)).unwrap();
    assert!(result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 2);
  }

  #[test]
  fn sixth_distinct_frame_evicts_the_first() {
    let detector = detector(5, 0.2);
    for (i, value) in [0u8, 40, 80, 120, 160].iter().enumerate() {
      let result = detector.detect(&solid(i as u64 + 1, 4, 4, *value)).unwrap();
      assert!(!result.is_empty());
    }
    assert_eq!(detector.memory_len().unwrap(), 5);

    let result = detector.detect(&solid(6, 4, 4, 200)).unwrap();
    assert!(!result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 5);

    // 最旧的一帧（值 0）已被淘汰：与其相同的帧现在也判为显著变化
    let result = detector.detect(&solid(7, 4, 4, 0)).unwrap();
    assert!(!result.is_empty());
  }

  #[test]
  fn suppressed_frame_leaves_memory_untouched() {
    let detector = detector(5, 0.2);
    detector.detect(&solid(1, 4, 4, 0)).unwrap();

    let before = detector.memory_len().unwrap();
    let result = detector.detect(&solid(2, 4, 4, 3)).unwrap();

    assert!(result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), before);
  }

  #[test]
  fn zero_required_diff_accepts_identical_frames() {
    let detector = detector(3, 0.0);
    detector.detect(&solid(1, 4, 4, 7)).unwrap();

    let result = detector.detect(&solid(2, 4, 4, 7)).unwrap();
    assert!(!result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 2);
  }

  #[test]
  fn erase_clears_memory_and_next_frame_bootstraps() {
    let detector = detector(5, 0.2);
    detector.detect(&solid(1, 4, 4, 0)).unwrap();
    detector.detect(&solid(2, 4, 4, 100)).unwrap();

    assert_eq!(detector.erase_memories().unwrap(), 2);
    assert_eq!(detector.memory_len().unwrap(), 0);
    assert_eq!(detector.erase_memories().unwrap(), 0);

    // 清空后的下一帧重新落入首帧路径
    let result = detector.detect(&solid(3, 4, 4, 0)).unwrap();
    assert!(!result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 1);
  }

  #[test]
  fn mismatched_dimension_frame_detects_against_full_memory() {
    let detector = detector(5, 0.2);
    detector.detect(&solid(1, 4, 4, 0)).unwrap();

    // 尺寸不同的帧与任何记忆帧的差异都是 1.0
    let result = detector.detect(&solid(2, 8, 8, 0)).unwrap();
    assert!(!result.is_empty());
    assert_eq!(detector.memory_len().unwrap(), 2);
  }
}
