// 该文件是 Zhiwei （见微知著） 项目的一部分。
// src/task.rs - 任务定义
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

use std::{thread, time::Duration};

use tracing::{info, warn};

use crate::{
  detector::DetectResult,
  frame::Frame,
  input::FrameSource,
  output::Render,
  service::{ChangeService, ServiceError},
};

pub trait Task<S, O>: Sized {
  type Error;
  fn run_task(self, service: S, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  S: FrameSource,
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult, Error = RE>,
> Task<ChangeService<S>, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, service: ChangeService<S>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let now = std::time::Instant::now();
    let (frame, result) = service.get_detections()?;
    let elapsed = now.elapsed();
    info!("检测完成，耗时: {:.2?}", elapsed);
    if result.is_empty() {
      info!("未检测到显著变化");
    } else {
      info!("检测到显著变化");
    }
    output.render_result(&frame, &result)?;
    info!("渲染完成");

    Ok(())
  }
}

/// 连续采集失败达到该次数后终止任务
const MAX_CAPTURE_FAILURES: usize = 10;

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  S: FrameSource,
  RE: std::error::Error + Sync + Send + 'static,
  O: Render<Frame, DetectResult, Error = RE>,
> Task<ChangeService<S>, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, service: ChangeService<S>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .expect("Error setting Ctrl-C handler");

    let mut frame_index = 0;
    let mut capture_failures = 0;
    let mut now = std::time::Instant::now();
    loop {
      match service.get_detections() {
        Ok((frame, result)) => {
          capture_failures = 0;
          frame_index = (frame_index + 1) % usize::MAX;
          info!("处理第 {} 帧图像", frame_index);
          let elapsed_a = now.elapsed();
          output.render_result(&frame, &result)?;
          let elapsed_b = now.elapsed();
          now = std::time::Instant::now();
          info!("检测完成，耗时: {:.2?} / {:.2?}", elapsed_a, elapsed_b);
        }
        Err(ServiceError::Capture(e)) => {
          // 采集失败可恢复，下一次采集相互独立
          capture_failures += 1;
          warn!(
            "采集失败 ({}/{}): {}",
            capture_failures, MAX_CAPTURE_FAILURES, e
          );
          if capture_failures >= MAX_CAPTURE_FAILURES {
            anyhow::bail!("连续 {} 次采集失败，终止任务", capture_failures);
          }
        }
        Err(e) => return Err(e.into()),
      }

      if self.frame_number.map(|n| frame_index >= n).unwrap_or(false) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}
