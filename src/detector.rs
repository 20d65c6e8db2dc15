// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/detector.rs - 检测器定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

pub trait Detector {
  type Input;
  type Output;
  type Error;

  fn detect(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 显著变化检测结果的类别标签
pub const SIGNIFICANT_CHANGE_LABEL: &str = "significant_change";

#[derive(Debug, Clone)]
pub struct DetectItem {
  pub label: &'static str,
  pub score: f32,
}

#[derive(Debug, Clone)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn empty() -> Self {
    Self {
      items: Box::new([]),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// 以 JSON 数组表示检测结果，供命令与记录输出使用
  pub fn to_json(&self) -> serde_json::Value {
    serde_json::Value::Array(
      self
        .items
        .iter()
        .map(|item| {
          serde_json::json!({
            "class_name": item.label,
            "confidence": item.score,
          })
        })
        .collect(),
    )
  }
}

mod pixel_diff;
pub use self::pixel_diff::{
  PIXEL_DIFF_TOLERANCE, PixelDiff, PixelDiffError, diff_ratio, differs_from_all,
};
