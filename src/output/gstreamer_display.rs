// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/output/gstreamer_display.rs - GStreamer 窗口显示
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

//! # GStreamer 窗口显示模块
//!
//! 通过 `appsrc ! videoconvert ! autovideosink` 把 RGB 帧显示在窗口中。
//!
//! 按键来自视频窗口向上游发送的导航事件（navigation key-press），
//! 在 appsrc 的 src pad 上截获后放入通道，由 [`Display::poll_key`] 取出。
//! Ctrl-C 被转换为退出键，与在窗口中按下退出键等价。

use std::{
  sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
  thread,
  time::Duration,
};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::output::Display;

// 中断后等待正常退出的时间，超时强制结束进程
const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

const DISPLAY_PIPELINE: &str =
  "appsrc name=src is-live=true do-timestamp=true format=time ! videoconvert ! autovideosink sync=false";

/// GStreamer 显示错误类型
#[derive(Error, Debug)]
pub enum GStreamerDisplayError {
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsrc 元素
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  /// 无法转换元素为 appsrc
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 状态改变错误
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  /// 信号处理器设置失败
  #[error("Signal handler error: {0}")]
  SignalHandlerError(#[from] ctrlc::Error),
}

/// GStreamer 显示窗口
///
/// 管道在第一次 [`Display::show`] 时启动，此前不会创建窗口。
pub struct GStreamerDisplay {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  keys: Receiver<char>,
  window_name: Option<String>,
  frame_size: Option<(u32, u32)>,
  playing: bool,
  frame_count: u64,
}

impl GStreamerDisplay {
  /// 创建显示管道，`quit_key` 为 Ctrl-C 对应的按键
  pub fn new(quit_key: char) -> Result<Self, GStreamerDisplayError> {
    gst::init()?;

    info!("Creating display pipeline: {}", DISPLAY_PIPELINE);
    let pipeline = gst::parse::launch(DISPLAY_PIPELINE)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerDisplayError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerDisplayError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerDisplayError::AppSrcConversionFailed)?;

    let (tx, keys) = mpsc::channel();
    install_key_probe(&appsrc, tx.clone())?;

    ctrlc::set_handler(interrupt_handler(tx, quit_key, FORCE_EXIT_AFTER, || {
      std::process::exit(1);
    }))?;

    Ok(GStreamerDisplay {
      pipeline,
      appsrc,
      keys,
      window_name: None,
      frame_size: None,
      playing: false,
      frame_count: 0,
    })
  }

  fn configure(&mut self, width: u32, height: u32) -> Result<(), GStreamerDisplayError> {
    if self.frame_size == Some((width, height)) {
      return Ok(());
    }

    let caps = gst::Caps::builder("video/x-raw")
      .field("format", "RGB")
      .field("width", width as i32)
      .field("height", height as i32)
      .field("framerate", gst::Fraction::new(0, 1))
      .build();
    self.appsrc.set_caps(Some(&caps));
    self.frame_size = Some((width, height));
    debug!("显示尺寸: {}x{}", width, height);

    if !self.playing {
      self.pipeline.set_state(gst::State::Playing)?;
      self.playing = true;
      info!("显示窗口已打开");
    }
    Ok(())
  }

  fn set_title(&mut self, window_name: &str) {
    if self.window_name.as_deref() == Some(window_name) {
      return;
    }
    let mut tags = gst::TagList::new();
    if let Some(tags) = tags.get_mut() {
      tags.add::<gst::tags::Title>(&window_name, gst::TagMergeMode::Replace);
    }
    if !self.appsrc.send_event(gst::event::Tag::new(tags)) {
      debug!("窗口标题事件未被处理");
    }
    self.window_name = Some(window_name.to_string());
  }

  /// 取出总线上的错误消息
  fn check_bus(&self) -> Result<(), GStreamerDisplayError> {
    let Some(bus) = self.pipeline.bus() else {
      return Ok(());
    };
    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
      if let gst::MessageView::Error(err) = msg.view() {
        error!("显示管道错误: {}", err.error());
        return Err(GStreamerDisplayError::PipelineError(format!(
          "{} ({:?})",
          err.error(),
          err.debug()
        )));
      }
    }
    Ok(())
  }
}

/// Ctrl-C 处理：送出退出键，`grace` 后仍未退出则调用 `force_exit`
fn interrupt_handler<E>(
  tx: Sender<char>,
  quit_key: char,
  grace: Duration,
  force_exit: E,
) -> impl FnMut() + Send + 'static
where
  E: Fn() + Clone + Send + 'static,
{
  move || {
    info!("收到中断信号，准备退出...");
    let _ = tx.send(quit_key);
    let force_exit = force_exit.clone();
    thread::spawn(move || {
      thread::sleep(grace);
      warn!("强制退出程序");
      force_exit();
    });
  }
}

/// 在 appsrc 的 src pad 上截获上游导航按键事件
fn install_key_probe(
  appsrc: &gst_app::AppSrc,
  tx: Sender<char>,
) -> Result<(), GStreamerDisplayError> {
  let pad = appsrc
    .static_pad("src")
    .ok_or_else(|| GStreamerDisplayError::PipelineError("appsrc has no src pad".to_string()))?;

  pad.add_probe(gst::PadProbeType::EVENT_UPSTREAM, move |_pad, info| {
    if let Some(gst::PadProbeData::Event(ref event)) = info.data
      && event.type_() == gst::EventType::Navigation
      && let Some(key) = event.structure().and_then(navigation_key)
    {
      let _ = tx.send(key);
    }
    gst::PadProbeReturn::Ok
  });

  Ok(())
}

/// 解析导航事件中的按键，只接受单字符按键
fn navigation_key(s: &gst::StructureRef) -> Option<char> {
  if s.get::<&str>("event").ok()? != "key-press" {
    return None;
  }
  let key = s.get::<&str>("key").ok()?;
  let mut chars = key.chars();
  match (chars.next(), chars.next()) {
    (Some(c), None) => Some(c),
    _ => None,
  }
}

impl Display<RgbImage> for GStreamerDisplay {
  type Error = GStreamerDisplayError;

  fn show(&mut self, window_name: &str, frame: &RgbImage) -> Result<(), Self::Error> {
    self.configure(frame.width(), frame.height())?;
    self.set_title(window_name);

    let buffer = gst::Buffer::from_mut_slice(frame.as_raw().clone());
    self.appsrc.push_buffer(buffer).map_err(|e| {
      GStreamerDisplayError::PipelineError(format!("Failed to push buffer: {:?}", e))
    })?;
    self.frame_count += 1;
    Ok(())
  }

  fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>, Self::Error> {
    self.check_bus()?;
    match self.keys.recv_timeout(timeout) {
      Ok(key) => Ok(Some(key)),
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
    }
  }

  fn destroy_all(&mut self) {
    if !self.playing {
      return;
    }
    let _ = self.appsrc.end_of_stream();
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer display pipeline: {}", e);
    }
    self.playing = false;
    self.frame_size = None;
    info!("显示窗口已关闭，共显示 {} 帧", self.frame_count);
  }
}

impl Drop for GStreamerDisplay {
  fn drop(&mut self) {
    self.destroy_all();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key_event(event: &str, key: &str) -> gst::Structure {
    gst::Structure::builder("application/x-gst-navigation")
      .field("event", event)
      .field("key", key)
      .build()
  }

  #[test]
  fn single_char_key_press_is_accepted() {
    gst::init().unwrap();
    assert_eq!(navigation_key(&key_event("key-press", "q")), Some('q'));
  }

  #[test]
  fn interrupt_sends_quit_key_then_forces_exit() {
    let (tx, keys) = mpsc::channel();
    let (exit_tx, exited) = mpsc::channel();
    let mut handler = interrupt_handler(tx, 'q', Duration::from_millis(10), move || {
      let _ = exit_tx.send(());
    });

    handler();
    assert_eq!(keys.try_recv(), Ok('q'));
    assert!(exited.recv_timeout(Duration::from_secs(5)).is_ok());
  }

  #[test]
  fn release_and_named_keys_are_ignored() {
    gst::init().unwrap();
    assert_eq!(navigation_key(&key_event("key-release", "q")), None);
    assert_eq!(navigation_key(&key_event("key-press", "Escape")), None);
  }
}
