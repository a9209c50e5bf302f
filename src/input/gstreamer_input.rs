// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
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

//! # GStreamer 视频输入模块
//!
//! 摄像头（V4L2）或视频文件经 GStreamer 解码并转换为 RGB，
//! 通过 appsink 逐帧取出。
//!
//! ## URL Scheme
//!
//! - `gst://camera/dev/video0?width=1280&height=720&fps=30`
//! - `gst://file/path/to/video.mp4?width=640&height=480`
//!
//! `width`/`height` 可选，给出时插入 `videoscale` 调整输出尺寸。
//!
//! ## 基本用法
//!
//! ```no_run
//! use yolo_fps::input::{GStreamerInputPipelineBuilder, VideoSource};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut input = GStreamerInputPipelineBuilder::new()
//!     .camera_index(0)
//!     .target_format("RGB")
//!     .build()?;
//! while let Some(frame) = input.next() {
//!     println!("帧: {}x{}", frame.width(), frame.height());
//! }
//! input.release();
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use v4l::video::Capture;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{CameraSpec, VideoSource},
};

// 单次拉取样本的等待时间
const PULL_TIMEOUT_MS: u64 = 100;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  /// GStreamer 库错误
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  /// 无法获取 appsink 元素
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  /// 无法转换元素为 appsink
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  /// 无法从 caps 获取视频信息
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  /// 不支持的视频格式
  #[error("Unsupported video format")]
  UnsupportedFormat,
  /// 管道错误
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  /// 管道中没有任何源
  #[error("No source in pipeline")]
  EmptyPipeline,
  /// 缓冲区大小不匹配
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    fps: Option<u32>,
  },
  TargetFormat {
    format: String,
  },
  FrameSize {
    width: u32,
    height: u32,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(path) => {
        format!("filesrc location=\"{}\" ! decodebin", path)
      }
      GStreamerInputBuilderItem::CameraSource { camera, fps } => match fps {
        Some(fps) => format!(
          "v4l2src device={} ! videorate ! video/x-raw,framerate={}/1",
          camera, fps
        ),
        None => format!("v4l2src device={}", camera),
      },
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
      GStreamerInputBuilderItem::FrameSize { width, height } => {
        format!("videoscale ! video/x-raw,width={},height={}", width, height)
      }
    }
  }

  fn is_source(&self) -> bool {
    matches!(
      self,
      GStreamerInputBuilderItem::FileSource(_) | GStreamerInputBuilderItem::CameraSource { .. }
    )
  }
}

/// GStreamer 输入管道构建器
#[derive(Debug, Default)]
pub struct GStreamerInputPipelineBuilder {
  items: Vec<GStreamerInputBuilderItem>,
  live: bool,
}

impl GStreamerInputPipelineBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// 视频文件源
  pub fn file(mut self, path: &str) -> Self {
    self.items.push(GStreamerInputBuilderItem::FileSource(path.to_string()));
    self.live = false;
    self
  }

  /// 按设备路径打开摄像头
  pub fn camera(mut self, device: &str, fps: Option<u32>) -> Self {
    self.items.push(GStreamerInputBuilderItem::CameraSource {
      camera: device.to_string(),
      fps,
    });
    self.live = true;
    self
  }

  /// 按编号打开摄像头（`/dev/video{index}`）
  pub fn camera_index(self, index: u32) -> Self {
    let device = CameraSpec::device_path(index);
    probe_camera(index);
    self.camera(&device, None)
  }

  /// 输出帧尺寸
  pub fn frame_size(mut self, width: u32, height: u32) -> Self {
    self
      .items
      .push(GStreamerInputBuilderItem::FrameSize { width, height });
    self
  }

  pub fn target_format(mut self, format: &str) -> Self {
    self.items.push(GStreamerInputBuilderItem::TargetFormat {
      format: format.to_string(),
    });
    self
  }

  /// 完整的管道描述
  pub fn describe(&self) -> String {
    let basic_pipeline = self
      .items
      .iter()
      .map(GStreamerInputBuilderItem::to_pipeline)
      .collect::<Vec<String>>()
      .join(" ! ");
    let sink = if self.live {
      "appsink max-buffers=2 drop=true name=sink"
    } else {
      "appsink max-buffers=4 sync=false name=sink"
    };
    format!("{} ! {}", basic_pipeline, sink)
  }

  /// 创建并启动管道
  ///
  /// 管道无法进入播放状态时返回未打开的输入源。
  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    if !self.items.iter().any(GStreamerInputBuilderItem::is_source) {
      return Err(GStreamerInputError::EmptyPipeline);
    }

    gst::init()?;

    let full_pipeline = self.describe();
    info!("GStreamer pipeline description: {}", full_pipeline);

    let pipeline = gst::parse::launch(&full_pipeline)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let open = match pipeline.set_state(gst::State::Playing) {
      Ok(_) => true,
      Err(e) => {
        error!("无法启动输入管道: {}", e);
        if let Err(e) = pipeline.set_state(gst::State::Null) {
          warn!("Failed to stop GStreamer pipeline: {}", e);
        }
        false
      }
    };

    Ok(GStreamerInput {
      pipeline,
      appsink,
      open,
    })
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();
    let number = |key: &str| query.get(key).and_then(|v| v.parse::<u32>().ok());

    let mut builder = match url.host_str() {
      Some("camera") => Self::new().camera(url.path(), number("fps")),
      Some("file") => Self::new().file(url.path()),
      _ => {
        return Err(GStreamerInputError::SchemeMismatch);
      }
    };

    builder = builder.target_format("RGB");
    if let (Some(width), Some(height)) = (number("width"), number("height")) {
      builder = builder.frame_size(width, height);
    }

    Ok(builder)
  }
}

/// 用 V4L2 查询摄像头当前格式，仅用于日志
fn probe_camera(index: u32) {
  match v4l::Device::new(index as usize) {
    Ok(device) => match device.format() {
      Ok(format) => info!(
        "摄像头 #{}: {}x{} {}",
        index, format.width, format.height, format.fourcc
      ),
      Err(e) => warn!("无法查询摄像头 #{} 格式: {}", index, e),
    },
    Err(e) => warn!("无法打开摄像头 #{}: {}", index, e),
  }
}

/// GStreamer 视频输入
///
/// 管理 GStreamer 管道和 appsink，逐帧输出 RGB 图像。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  open: bool,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    self.release();
  }
}

impl GStreamerInput {
  /// 带超时地拉取样本，两次尝试之间检查总线
  ///
  /// 管道出错时不会发送 EOS，只能从总线上得知。
  fn pull_sample(&mut self) -> Option<gst::Sample> {
    let timeout = gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS);
    loop {
      if let Some(sample) = self.appsink.try_pull_sample(timeout) {
        return Some(sample);
      }
      if self.appsink.is_eos() {
        info!("输入流结束");
        return None;
      }
      if let Err(e) = self.check_bus() {
        error!("输入管道错误: {}", e);
        return None;
      }
    }
  }

  /// 取出总线上的错误与结束消息
  fn check_bus(&self) -> Result<(), GStreamerInputError> {
    let Some(bus) = self.pipeline.bus() else {
      return Ok(());
    };
    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Eos]) {
      match msg.view() {
        gst::MessageView::Error(err) => {
          return Err(GStreamerInputError::PipelineError(format!(
            "{} ({:?})",
            err.error(),
            err.debug()
          )));
        }
        gst::MessageView::Eos(_) => {
          return Err(GStreamerInputError::PipelineError("End of stream".to_string()));
        }
        _ => {}
      }
    }
    Ok(())
  }
}

impl Iterator for GStreamerInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    if !self.open {
      return None;
    }
    let frame = self
      .pull_sample()
      .and_then(|sample| {
        convert_sample_to_rgb(&sample)
          .map_err(|e| {
            error!("Failed to fetch sample: {}", e);
            e
          })
          .ok()
      });
    if frame.is_none() {
      self.open = false;
    }
    frame
  }
}

impl VideoSource for GStreamerInput {
  fn is_open(&self) -> bool {
    self.open
  }

  fn release(&mut self) {
    self.open = false;
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    } else {
      debug!("输入管道已释放");
    }
  }
}

fn convert_sample_to_rgb(sample: &gst::Sample) -> Result<RgbImage, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;

  let bgr = match video_info.format() {
    gst_video::VideoFormat::Rgb => false,
    gst_video::VideoFormat::Bgr => true,
    _ => return Err(GStreamerInputError::UnsupportedFormat),
  };

  packed_rows_to_rgb(map.as_slice(), width, height, stride, bgr)
}

/// 按行步长拷贝 24 位打包像素，`bgr` 为真时交换 R/B 通道
fn packed_rows_to_rgb(
  data: &[u8],
  width: usize,
  height: usize,
  stride: usize,
  bgr: bool,
) -> Result<RgbImage, GStreamerInputError> {
  let row_bytes = width * 3;
  let expected = if height == 0 {
    0
  } else {
    stride * (height - 1) + row_bytes
  };
  if stride < row_bytes || data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    let line = &data[start..start + row_bytes];
    if bgr {
      for px in line.chunks_exact(3) {
        pixels.extend_from_slice(&[px[2], px[1], px[0]]);
      }
    } else {
      pixels.extend_from_slice(line);
    }
  }

  RgbImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
    GStreamerInputError::PipelineError("Failed to create RGB image".to_string())
  })
}
