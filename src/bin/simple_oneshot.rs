// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/bin/simple_oneshot.rs - 单次变化检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use url::Url;

use tracing::info;
use zhiwei::{
  FromUrl,
  config::ServiceConfig,
  input::InputWrapper,
  output::OutputWrapper,
  service::ChangeService,
  task::{OneShotTask, Task},
};

/// Zhiwei 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 服务配置文件路径（JSON，包含 image_memories、
  /// required_diff、input_camera）
  #[arg(long, value_name = "CONFIG")]
  pub config: std::path::PathBuf,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let raw = std::fs::read_to_string(&args.config)?;
  let config = ServiceConfig::from_json_str(&raw)?;

  info!("配置文件路径: {}", args.config.display());
  info!("输入相机: {}", config.input_camera);
  info!("输出路径: {}", args.output);

  let camera = Url::parse(&config.input_camera)?;
  let input = InputWrapper::from_url(&camera)?;
  let output = OutputWrapper::from_url(&args.output)?;
  let service = ChangeService::new(&config, input);

  OneShotTask.run_task(service, output)?;

  Ok(())
}
