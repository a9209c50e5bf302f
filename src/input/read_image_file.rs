// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::VideoSource};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 单张图像输入，只产生一帧
pub struct ImageFileInput {
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let image = Self::load(Path::new(url.path()))?;
    Ok(ImageFileInput { image: Some(image) })
  }
}

impl ImageFileInput {
  /// 打开图像文件，失败时返回未打开的输入源
  pub fn open(path: &Path) -> Self {
    match Self::load(path) {
      Ok(image) => ImageFileInput { image: Some(image) },
      Err(e) => {
        error!("无法读取图像文件 {}: {}", path.display(), e);
        ImageFileInput { image: None }
      }
    }
  }

  fn load(path: &Path) -> Result<RgbImage, ImageFileInputError> {
    Ok(ImageReader::open(path)?.decode()?.to_rgb8())
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}

impl VideoSource for ImageFileInput {
  fn is_open(&self) -> bool {
    self.image.is_some()
  }

  fn release(&mut self) {
    self.image = None;
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::from_pixel(4, 3, Rgb([0, 255, 0])).save(&path).unwrap();

    let mut input = ImageFileInput::open(&path);
    assert!(input.is_open());
    let frame = input.next().unwrap();
    assert_eq!(frame.dimensions(), (4, 3));
    assert_eq!(frame.get_pixel(2, 1).0, [0, 255, 0]);
    assert!(!input.is_open());
    assert!(input.next().is_none());
  }

  #[test]
  fn image_url_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::new(2, 2).save(&path).unwrap();

    let url = Url::from_file_path(&path).unwrap();
    let url = Url::parse(&format!("image://{}", url.path())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    assert!(input.next().is_some());
  }

  #[test]
  fn release_closes_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    RgbImage::new(2, 2).save(&path).unwrap();

    let mut input = ImageFileInput::open(&path);
    input.release();
    assert!(!input.is_open());
    assert!(input.next().is_none());
  }

  #[test]
  fn wrong_scheme_is_rejected() {
    let url = Url::parse("file:///tmp/frame.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }
}
