// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/output/draw.rs - 检测结果与帧率可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  model::{DetectItem, DetectResult, WithLabel},
  output::TextOverlay,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
const LABEL_CHAR_WIDTH: f32 = 11.0; // 每字符平均宽度（粗略估计）
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 0, 255]; // 蓝色
const BOX_THICKNESS: i32 = 2;

// 帧率文本
const FPS_FONT_SIZE: f32 = 32.0;
const FPS_ORIGIN: (i32, i32) = (10, 6);
const FPS_COLOR: [u8; 3] = [0, 255, 0]; // 绿色
const FPS_THICKNESS: i32 = 2;

/// 指定字体文件的环境变量，未设置时使用内置字体
pub const FONT_ENV: &str = "YOLO_FPS_FONT";

const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

#[derive(Clone)]
pub struct Draw {
  font: FontArc,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_vertical_padding: i32,
  label_color: [u8; 3],
  fps_font_size: f32,
  fps_origin: (i32, i32),
  fps_color: [u8; 3],
  fps_thickness: i32,
}

impl Draw {
  pub fn new(font: FontArc) -> Self {
    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_vertical_padding: LABEL_TEXT_VERTICAL_PADDING,
      label_color: LABEL_COLOR,
      fps_font_size: FPS_FONT_SIZE,
      fps_origin: FPS_ORIGIN,
      fps_color: FPS_COLOR,
      fps_thickness: FPS_THICKNESS,
    }
  }

  pub fn from_file(path: &Path) -> Result<Self, DrawError> {
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载字体: {}", path.display());
    Ok(Self::new(font))
  }

  /// 使用内置字体
  pub fn embedded() -> Result<Self, DrawError> {
    let font = FontArc::try_from_slice(EMBEDDED_FONT)?;
    Ok(Self::new(font))
  }

  /// 优先使用环境变量指定的字体，否则使用内置字体
  pub fn load() -> Result<Self, DrawError> {
    match std::env::var_os(FONT_ENV) {
      Some(path) => Self::from_file(Path::new(&path)),
      None => Self::embedded(),
    }
  }

  fn draw_bbox_with_label<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    bbox: &[f32; 4],
    kind: &T,
    score: f32,
  ) {
    let Some((x_min, y_min, _, _)) = draw_bbox(image, bbox, self.label_color, BOX_THICKNESS) else {
      return;
    };

    let label = format!("{} {:.2}", kind.to_label_str(), score);
    let scale = PxScale::from(self.font_size);
    let text_color = Rgb([255u8, 255u8, 255u8]); // 白色文本

    // 估算文本大小（粗略估计）
    let text_width = (label.len() as f32 * self.label_char_width) as i32;
    let text_height = self.label_text_height;

    // 标签放在边框上方
    let label_x = x_min.max(0);
    let label_y = (y_min - text_height).max(0);

    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = text_width.min(max_width) as u32;
    let label_height = text_height as u32;

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(label_x, label_y).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, Rgb(self.label_color));

      draw_text_mut(
        image,
        text_color,
        label_x,
        label_y + self.label_text_vertical_padding,
        scale,
        &self.font,
        &label,
      );
    }
  }
}

/// 绘制边框，bbox 为归一化坐标 [x_min, y_min, x_max, y_max]
///
/// 返回裁剪到图像内的像素坐标，框退化时不绘制并返回 None。
pub fn draw_bbox(
  image: &mut RgbImage,
  bbox: &[f32; 4],
  color: [u8; 3],
  thickness: i32,
) -> Option<(i32, i32, i32, i32)> {
  let (w, h) = (image.width() as i32, image.height() as i32);
  if w == 0 || h == 0 {
    return None;
  }

  let x_min = ((bbox[0] * w as f32).floor() as i32).clamp(0, w - 1);
  let y_min = ((bbox[1] * h as f32).floor() as i32).clamp(0, h - 1);
  let x_max = ((bbox[2] * w as f32).ceil() as i32).clamp(0, w - 1);
  let y_max = ((bbox[3] * h as f32).ceil() as i32).clamp(0, h - 1);

  if x_min >= x_max || y_min >= y_max {
    return None;
  }

  for t in 0..thickness {
    let (l, r) = ((x_min + t).min(x_max), (x_max - t).max(x_min));
    let (top, bottom) = ((y_min + t).min(y_max), (y_max - t).max(y_min));
    for x in l..=r {
      image.put_pixel(x as u32, top as u32, Rgb(color));
      image.put_pixel(x as u32, bottom as u32, Rgb(color));
    }
    for y in top..=bottom {
      image.put_pixel(l as u32, y as u32, Rgb(color));
      image.put_pixel(r as u32, y as u32, Rgb(color));
    }
  }

  Some((x_min, y_min, x_max, y_max))
}

pub trait DrawDetectionOnImage<T: WithLabel> {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>);
}

impl<T: WithLabel> DrawDetectionOnImage<T> for Draw {
  fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<T>) {
    for DetectItem { kind, score, bbox } in result.items.iter() {
      self.draw_bbox_with_label(image, bbox, kind, *score);
    }
    debug!("绘制 {} 个检测框", result.items.len());
  }
}

impl TextOverlay<RgbImage> for Draw {
  fn put_text(&self, frame: &mut RgbImage, text: &str) {
    let scale = PxScale::from(self.fps_font_size);
    let (x, y) = self.fps_origin;
    // 偏移叠画模拟笔画宽度
    for dx in 0..self.fps_thickness {
      for dy in 0..self.fps_thickness {
        draw_text_mut(
          frame,
          Rgb(self.fps_color),
          x + dx,
          y + dy,
          scale,
          &self.font,
          text,
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CocoLabel;

  const RED: [u8; 3] = [255, 0, 0];

  #[test]
  fn bbox_edges_are_painted() {
    let mut image = RgbImage::new(10, 10);
    let rect = draw_bbox(&mut image, &[0.2, 0.2, 0.8, 0.8], RED, 2).unwrap();
    assert_eq!(rect, (2, 2, 8, 8));
    assert_eq!(image.get_pixel(2, 5).0, RED);
    assert_eq!(image.get_pixel(3, 5).0, RED);
    assert_eq!(image.get_pixel(8, 8).0, RED);
    assert_eq!(image.get_pixel(5, 5).0, [0, 0, 0]);
  }

  #[test]
  fn bbox_is_clamped_to_image() {
    let mut image = RgbImage::new(4, 4);
    let rect = draw_bbox(&mut image, &[-1.0, -1.0, 2.0, 2.0], RED, 1).unwrap();
    assert_eq!(rect, (0, 0, 3, 3));
    assert_eq!(image.get_pixel(3, 3).0, RED);
  }

  #[test]
  fn degenerate_bbox_is_skipped() {
    let mut image = RgbImage::new(4, 4);
    assert!(draw_bbox(&mut image, &[0.5, 0.5, 0.5, 0.9], RED, 2).is_none());
    assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let result = Draw::from_file(Path::new("/nonexistent/font.ttf"));
    assert!(matches!(result, Err(DrawError::IoError(_))));
  }

  #[test]
  fn embedded_font_loads() {
    assert!(Draw::embedded().is_ok());
  }

  #[test]
  fn overlay_and_labels_paint_pixels() {
    let draw = Draw::embedded().unwrap();

    let mut image = RgbImage::new(200, 80);
    draw.put_text(&mut image, "FPS: 10.00");
    assert!(image.pixels().any(|p| p.0[1] > 200 && p.0[0] < 50 && p.0[2] < 50));

    let mut image = RgbImage::new(100, 100);
    let result = DetectResult {
      items: vec![DetectItem {
        kind: CocoLabel(0),
        score: 0.75,
        bbox: [0.1, 0.5, 0.9, 0.9],
      }]
      .into_boxed_slice(),
    };
    draw.draw_detections_on_image(&mut image, &result);
    assert_eq!(image.get_pixel(50, 90).0, LABEL_COLOR);
  }
}
