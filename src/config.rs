// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/config.rs - 服务配置
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

use serde_json::Value;
use thiserror::Error;

/// `required_diff` 缺省值：要求 20% 的像素发生变化
pub const DEFAULT_REQUIRED_DIFF: f32 = 0.2;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("缺少必需配置项: {0}")]
  MissingField(&'static str),
  #[error("image_memories 必须为正整数")]
  InvalidImageMemories,
  #[error("input_camera 必须为非空字符串")]
  InvalidInputCamera,
  #[error("required_diff 必须为数值")]
  RequiredDiffType,
  #[error("required_diff 必须位于 [0.0, 1.0] 区间, 实际为 {0}")]
  RequiredDiffRange(f64),
  #[error("配置解析错误: {0}")]
  Json(#[from] serde_json::Error),
}

/// 服务配置。服务实例运行期间配置不可变，
/// 变更配置需要重新构造服务。
#[derive(Debug, Clone)]
pub struct ServiceConfig {
  /// 帧记忆容量
  pub image_memories: usize,
  /// 判定显著变化所需的最小差异比例
  pub required_diff: f32,
  /// 输入相机标识（输入源 URL 字符串）
  pub input_camera: String,
}

impl ServiceConfig {
  pub fn new(
    image_memories: usize,
    input_camera: impl Into<String>,
  ) -> Result<Self, ConfigError> {
    Self::with_required_diff(image_memories, input_camera, DEFAULT_REQUIRED_DIFF)
  }

  pub fn with_required_diff(
    image_memories: usize,
    input_camera: impl Into<String>,
    required_diff: f32,
  ) -> Result<Self, ConfigError> {
    if image_memories == 0 {
      return Err(ConfigError::InvalidImageMemories);
    }

    let input_camera = input_camera.into();
    if input_camera.is_empty() {
      return Err(ConfigError::InvalidInputCamera);
    }

    if !(0.0..=1.0).contains(&required_diff) {
      return Err(ConfigError::RequiredDiffRange(required_diff as f64));
    }

    Ok(Self {
      image_memories,
      required_diff,
      input_camera,
    })
  }

  /// 从 JSON 文本解析配置
  pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
    let value: Value = serde_json::from_str(raw)?;
    Self::from_json_value(&value)
  }

  /// 从 JSON 对象解析配置
  pub fn from_json_value(value: &Value) -> Result<Self, ConfigError> {
    let image_memories = value
      .get("image_memories")
      .ok_or(ConfigError::MissingField("image_memories"))?
      .as_i64()
      .filter(|n| *n > 0)
      .ok_or(ConfigError::InvalidImageMemories)? as usize;

    let input_camera = value
      .get("input_camera")
      .ok_or(ConfigError::MissingField("input_camera"))?
      .as_str()
      .ok_or(ConfigError::InvalidInputCamera)?;

    let required_diff = match value.get("required_diff") {
      None => DEFAULT_REQUIRED_DIFF,
      Some(v) => {
        let d = v.as_f64().ok_or(ConfigError::RequiredDiffType)?;
        if !(0.0..=1.0).contains(&d) {
          return Err(ConfigError::RequiredDiffRange(d));
        }
        d as f32
      }
    };

    Self::with_required_diff(image_memories, input_camera, required_diff)
  }
}
