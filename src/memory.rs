// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/memory.rs - 帧记忆队列
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

use std::collections::VecDeque;

use tracing::debug;

use crate::frame::Frame;

/// 有界的帧记忆队列，按插入顺序保存参考帧。
///
/// 容量在构造后不可变；已满时插入会先淘汰最旧的一帧。
#[derive(Debug)]
pub struct FrameMemory {
  frames: VecDeque<Frame>,
  capacity: usize,
}

impl FrameMemory {
  /// 创建容量为 `capacity` 的帧记忆。容量必须为正，
  /// 配置层在构造服务前已完成校验。
  pub fn new(capacity: usize) -> Self {
    assert!(capacity > 0, "帧记忆容量必须为正整数");
    Self {
      frames: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// 插入最新帧；容量已满时先淘汰最旧的一帧（恰好一帧）。
  pub fn insert(&mut self, frame: Frame) {
    if self.frames.len() >= self.capacity {
      if let Some(oldest) = self.frames.pop_front() {
        debug!("淘汰最旧记忆帧: 序号 {}", oldest.index);
      }
    }
    self.frames.push_back(frame);
  }

  /// 按插入顺序（最旧在前）遍历当前记忆帧
  pub fn iter(&self) -> impl Iterator<Item = &Frame> {
    self.frames.iter()
  }

  /// 清空全部记忆帧。对空记忆调用同样成功。
  pub fn clear(&mut self) {
    self.frames.clear();
  }

  pub fn len(&self) -> usize {
    self.frames.len()
  }

  pub fn is_empty(&self) -> bool {
    self.frames.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}
