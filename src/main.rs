// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use yolo_fps::{
  input::{InputWrapper, VideoSource},
  model::{Annotator, CocoLabel, Yolo26Builder},
  output::{GStreamerDisplay, draw::Draw},
  task::{DEFAULT_QUIT_KEY, FrameLoop, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型文件路径: {}", args.model.display());
  info!("输入来源: {}", args.camera);

  info!("正在加载模型...");
  let model = Yolo26Builder::new(&args.model).build::<CocoLabel>()?;
  info!("模型加载完成");

  let draw = Draw::load()?;

  let input = InputWrapper::open(&args.camera)?;
  if !input.is_open() {
    info!("输入源未打开，直接退出");
    return Ok(());
  }

  let display = GStreamerDisplay::new(DEFAULT_QUIT_KEY)?;

  FrameLoop::new(draw.clone())
    .run_task(input, Annotator::new(model, draw), display)?;

  Ok(())
}
