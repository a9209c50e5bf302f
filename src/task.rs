// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/task.rs - 逐帧检测与显示任务
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

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
  fps::{FpsMeter, fps_label},
  input::VideoSource,
  model::Detector,
  output::{Display, TextOverlay},
};

pub const DEFAULT_WINDOW_NAME: &str = "YOLO26 Inference";
pub const DEFAULT_QUIT_KEY: char = 'q';
pub const DEFAULT_KEY_WAIT: Duration = Duration::from_millis(1);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 逐帧循环：读取 -> 检测 -> 计时 -> 叠加帧率 -> 显示 -> 查询退出键
///
/// 输入耗尽或按下退出键时正常结束；检测或显示出错时返回错误，
/// 输入源和窗口随所有权释放。
pub struct FrameLoop<V> {
  overlay: V,
  window_name: String,
  quit_key: char,
  key_wait: Duration,
  meter: FpsMeter,
  clock: Box<dyn FnMut() -> Instant>,
}

impl<V> FrameLoop<V> {
  pub fn new(overlay: V) -> Self {
    Self {
      overlay,
      window_name: DEFAULT_WINDOW_NAME.to_string(),
      quit_key: DEFAULT_QUIT_KEY,
      key_wait: DEFAULT_KEY_WAIT,
      meter: FpsMeter::new(),
      clock: Box::new(Instant::now),
    }
  }

  pub fn with_window_name(mut self, window_name: &str) -> Self {
    self.window_name = window_name.to_string();
    self
  }

  pub fn with_quit_key(mut self, quit_key: char) -> Self {
    self.quit_key = quit_key;
    self
  }

  pub fn with_key_wait(mut self, key_wait: Duration) -> Self {
    self.key_wait = key_wait;
    self
  }

  /// 替换帧率计时使用的时钟
  pub fn with_clock(mut self, clock: impl FnMut() -> Instant + 'static) -> Self {
    self.clock = Box::new(clock);
    self
  }
}

impl<
  F,
  A,
  ME: std::error::Error + Sync + Send + 'static,
  DE: std::error::Error + Sync + Send + 'static,
  V: TextOverlay<A>,
  I: VideoSource<Item = F>,
  M: Detector<F, Annotated = A, Error = ME>,
  O: Display<A, Error = DE>,
> Task<I, M, O> for FrameLoop<V>
{
  type Error = anyhow::Error;

  fn run_task(mut self, mut input: I, model: M, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");

    let mut frame_index = 0usize;
    self.meter.start((self.clock)());

    while input.is_open() {
      let Some(frame) = input.next() else {
        info!("输入结束，退出任务循环");
        break;
      };
      frame_index += 1;

      let now = Instant::now();
      let mut annotated = model.detect(&frame)?;
      let elapsed = now.elapsed();

      let fps = self.meter.tick((self.clock)());
      debug!(
        "第 {} 帧推理完成，耗时: {:.2?}，FPS: {:.2}",
        frame_index, elapsed, fps
      );

      self.overlay.put_text(&mut annotated, &fps_label(fps));
      output.show(&self.window_name, &annotated)?;

      if output.poll_key(self.key_wait)? == Some(self.quit_key) {
        warn!("收到退出键，退出任务循环");
        break;
      }
    }

    input.release();
    output.destroy_all();

    info!(
      "任务完成，共处理 {} 帧，最终 FPS: {:.2}",
      frame_index,
      self.meter.fps()
    );
    Ok(())
  }
}
