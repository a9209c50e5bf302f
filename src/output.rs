// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/output.rs - 输出定义
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

use std::time::Duration;

/// 显示窗口
///
/// 实现者应在 `Drop` 中关闭窗口，保证出错退出时同样释放。
pub trait Display<Frame> {
  type Error;

  fn show(&mut self, window_name: &str, frame: &Frame) -> Result<(), Self::Error>;

  /// 非阻塞按键查询，最多等待 `timeout`
  fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, Self::Error>;

  fn destroy_all(&mut self);
}

/// 在帧上叠加一行文字
pub trait TextOverlay<Frame> {
  fn put_text(&self, frame: &mut Frame, text: &str);
}

pub mod draw;

#[cfg(feature = "gstreamer_display")]
mod gstreamer_display;
#[cfg(feature = "gstreamer_display")]
pub use self::gstreamer_display::{GStreamerDisplay, GStreamerDisplayError};
