// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::{convert::Infallible, fmt, path::PathBuf, str::FromStr};

use image::RgbImage;
use thiserror::Error;
use url::Url;

use crate::FromUrl;

/// 视频源
///
/// `next()` 返回 `None` 表示读取失败或输入耗尽，二者都视为正常结束。
pub trait VideoSource: Iterator {
  fn is_open(&self) -> bool;

  /// 释放底层设备，重复调用无副作用
  fn release(&mut self);
}

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// `--camera` 参数：摄像头编号、文件路径或输入 URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSpec {
  Index(u32),
  Path(PathBuf),
  Url(Url),
}

impl FromStr for CameraSpec {
  type Err = Infallible;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Ok(index) = s.parse::<u32>() {
      return Ok(CameraSpec::Index(index));
    }
    if s.contains("://")
      && let Ok(url) = Url::parse(s)
    {
      return Ok(CameraSpec::Url(url));
    }
    Ok(CameraSpec::Path(PathBuf::from(s)))
  }
}

impl fmt::Display for CameraSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CameraSpec::Index(index) => write!(f, "摄像头 #{}", index),
      CameraSpec::Path(path) => write!(f, "{}", path.display()),
      CameraSpec::Url(url) => write!(f, "{}", url),
    }
  }
}

impl CameraSpec {
  /// 摄像头编号对应的设备路径
  pub fn device_path(index: u32) -> String {
    format!("/dev/video{}", index)
  }

  pub fn is_image_file(&self) -> bool {
    match self {
      CameraSpec::Path(path) => path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false),
      _ => false,
    }
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[cfg(feature = "gstreamer_input")]
  #[error("GStreamer input error: {0}")]
  GStreamerInputError(#[from] GStreamerInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("Unsupported source: {0}")]
  Unsupported(String),
}

pub enum InputWrapper {
  #[cfg(feature = "gstreamer_input")]
  GStreamerInput(GStreamerInput),
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "gstreamer_input")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == GStreamerInputPipelineBuilder::SCHEME {
        let input = GStreamerInputPipelineBuilder::from_url(url)?.build()?;
        return Ok(InputWrapper::GStreamerInput(input));
      }
    }
    #[cfg(feature = "read_image_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl InputWrapper {
  /// 按 `--camera` 参数打开输入源
  ///
  /// 设备或文件打不开时返回一个未打开的输入源，而不是错误。
  pub fn open(spec: &CameraSpec) -> Result<Self, InputError> {
    match spec {
      CameraSpec::Url(url) => Self::from_url(url),
      #[cfg(feature = "read_image_file")]
      CameraSpec::Path(path) if spec.is_image_file() => {
        Ok(InputWrapper::ReadImageFile(ImageFileInput::open(path)))
      }
      #[cfg(feature = "gstreamer_input")]
      CameraSpec::Path(path) => {
        let input = GStreamerInputPipelineBuilder::new()
          .file(&path.to_string_lossy())
          .target_format("RGB")
          .build()?;
        Ok(InputWrapper::GStreamerInput(input))
      }
      #[cfg(feature = "gstreamer_input")]
      CameraSpec::Index(index) => {
        let input = GStreamerInputPipelineBuilder::new()
          .camera_index(*index)
          .target_format("RGB")
          .build()?;
        Ok(InputWrapper::GStreamerInput(input))
      }
      #[allow(unreachable_patterns)]
      other => Err(InputError::Unsupported(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.next(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
    }
  }
}

impl VideoSource for InputWrapper {
  fn is_open(&self) -> bool {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.is_open(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.is_open(),
    }
  }

  fn release(&mut self) {
    match self {
      #[cfg(feature = "gstreamer_input")]
      InputWrapper::GStreamerInput(input) => input.release(),
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.release(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn camera_index_is_parsed() {
    assert_eq!("0".parse::<CameraSpec>(), Ok(CameraSpec::Index(0)));
    assert_eq!("2".parse::<CameraSpec>(), Ok(CameraSpec::Index(2)));
  }

  #[test]
  fn plain_path_is_parsed() {
    assert_eq!(
      "videos/street.mp4".parse::<CameraSpec>(),
      Ok(CameraSpec::Path(PathBuf::from("videos/street.mp4")))
    );
  }

  #[test]
  fn url_is_parsed() {
    let spec: CameraSpec = "gst://camera/dev/video2?width=640".parse().unwrap();
    match spec {
      CameraSpec::Url(url) => {
        assert_eq!(url.scheme(), "gst");
        assert_eq!(url.host_str(), Some("camera"));
      }
      other => panic!("unexpected spec: {:?}", other),
    }
  }

  #[test]
  fn image_extension_is_detected() {
    assert!(CameraSpec::Path(PathBuf::from("a/b.JPG")).is_image_file());
    assert!(CameraSpec::Path(PathBuf::from("b.webp")).is_image_file());
    assert!(!CameraSpec::Path(PathBuf::from("b.mp4")).is_image_file());
    assert!(!CameraSpec::Index(0).is_image_file());
  }

  #[test]
  fn device_path_follows_index() {
    assert_eq!(CameraSpec::device_path(1), "/dev/video1");
  }

  #[cfg(feature = "read_image_file")]
  #[test]
  fn missing_image_opens_closed_source() {
    let spec = CameraSpec::Path(PathBuf::from("/nonexistent/frame.png"));
    let mut input = InputWrapper::open(&spec).unwrap();
    assert!(!input.is_open());
    assert!(input.next().is_none());
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = Url::parse("rtmp://host/live").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch)
    ));
  }
}
