// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/frame.rs - NHWC 模型输入帧定义
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

use image::{RgbImage, imageops::FilterType};

const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame<const W: u32, const H: u32> {
  fn as_nhwc(&self) -> &[u8];
}

/// 固定尺寸的 RGB NHWC 帧，作为模型输入
#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// 将任意尺寸的图像缩放到 `W x H`
  ///
  /// 不做留边，归一化坐标可以直接映射回原图。
  pub fn resized_from(image: &RgbImage) -> Self {
    if image.dimensions() == (W, H) {
      return Self {
        data: image.as_raw().clone().into_boxed_slice(),
      };
    }
    let resized = image::imageops::resize(image, W, H, FilterType::Triangle);
    Self {
      data: resized.into_raw().into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame<W, H> for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use image::Rgb;

  use super::*;

  #[test]
  fn resize_keeps_nhwc_layout() {
    let image = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
    let frame = RgbNhwcFrame::<4, 2>::resized_from(&image);
    assert_eq!(
      frame.as_nhwc().len(),
      frame.width() * frame.height() * frame.channels()
    );
    assert_eq!(&frame.as_nhwc()[..3], &[10, 20, 30]);
  }

  #[test]
  fn matching_size_is_copied() {
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(1, 1, Rgb([1, 2, 3]));
    let frame = RgbNhwcFrame::<2, 2>::resized_from(&image);
    assert_eq!(&frame.as_nhwc()[9..12], &[1, 2, 3]);
  }
}
