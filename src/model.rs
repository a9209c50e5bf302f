// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;

use crate::output::draw::DrawDetectionOnImage;

/// COCO 数据集类别名称
pub const COCO_CLASSES: [&str; 80] = [
  "person",
  "bicycle",
  "car",
  "motorcycle",
  "airplane",
  "bus",
  "train",
  "truck",
  "boat",
  "traffic light",
  "fire hydrant",
  "stop sign",
  "parking meter",
  "bench",
  "bird",
  "cat",
  "dog",
  "horse",
  "sheep",
  "cow",
  "elephant",
  "bear",
  "zebra",
  "giraffe",
  "backpack",
  "umbrella",
  "handbag",
  "tie",
  "suitcase",
  "frisbee",
  "skis",
  "snowboard",
  "sports ball",
  "kite",
  "baseball bat",
  "baseball glove",
  "skateboard",
  "surfboard",
  "tennis racket",
  "bottle",
  "wine glass",
  "cup",
  "fork",
  "knife",
  "spoon",
  "bowl",
  "banana",
  "apple",
  "sandwich",
  "orange",
  "broccoli",
  "carrot",
  "hot dog",
  "pizza",
  "donut",
  "cake",
  "chair",
  "couch",
  "potted plant",
  "bed",
  "dining table",
  "toilet",
  "tv",
  "laptop",
  "mouse",
  "remote",
  "keyboard",
  "cell phone",
  "microwave",
  "oven",
  "toaster",
  "sink",
  "refrigerator",
  "book",
  "clock",
  "vase",
  "scissors",
  "teddy bear",
  "hair drier",
  "toothbrush",
];

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 检测器：输入一帧，返回已绘制检测结果的副本
pub trait Detector<Frame> {
  type Annotated;
  type Error;

  fn detect(&self, frame: &Frame) -> Result<Self::Annotated, Self::Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn from_label_id(id: u32) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CocoLabel(pub u32);

impl WithLabel for CocoLabel {
  fn to_label_str(&self) -> String {
    COCO_CLASSES
      .get(self.0 as usize)
      .map(|name| name.to_string())
      .unwrap_or_else(|| format!("class-{}", self.0))
  }

  fn from_label_id(id: u32) -> Self {
    CocoLabel(id)
  }
}

/// 把模型和绘制器组合成检测器
pub struct Annotator<M, D> {
  model: M,
  draw: D,
}

impl<M, D> Annotator<M, D> {
  pub fn new(model: M, draw: D) -> Self {
    Self { model, draw }
  }
}

impl<T, M, D> Detector<RgbImage> for Annotator<M, D>
where
  T: WithLabel,
  M: Model<Input = RgbImage, Output = DetectResult<T>>,
  D: DrawDetectionOnImage<T>,
{
  type Annotated = RgbImage;
  type Error = M::Error;

  fn detect(&self, frame: &RgbImage) -> Result<Self::Annotated, Self::Error> {
    let result = self.model.infer(frame)?;
    let mut annotated = frame.clone();
    self.draw.draw_detections_on_image(&mut annotated, &result);
    Ok(annotated)
  }
}

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use image::Rgb;

  use super::*;

  struct FixedModel {
    calls: Cell<usize>,
  }

  impl Model for FixedModel {
    type Input = RgbImage;
    type Output = DetectResult<CocoLabel>;
    type Error = std::io::Error;

    fn infer(&self, _input: &RgbImage) -> Result<Self::Output, Self::Error> {
      self.calls.set(self.calls.get() + 1);
      Ok(DetectResult {
        items: vec![DetectItem {
          kind: CocoLabel(0),
          score: 0.9,
          bbox: [0.0, 0.0, 0.5, 0.5],
        }]
        .into_boxed_slice(),
      })
    }
  }

  struct MarkFirstPixel;

  impl DrawDetectionOnImage<CocoLabel> for MarkFirstPixel {
    fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult<CocoLabel>) {
      if !result.items.is_empty() {
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
      }
    }
  }

  #[test]
  fn label_names_follow_coco_order() {
    assert_eq!(CocoLabel::from_label_id(0).to_label_str(), "person");
    assert_eq!(CocoLabel(79).to_label_str(), "toothbrush");
    assert_eq!(CocoLabel(80).to_label_str(), "class-80");
  }

  #[test]
  fn annotator_draws_on_a_copy() {
    let annotator = Annotator::new(
      FixedModel {
        calls: Cell::new(0),
      },
      MarkFirstPixel,
    );
    let frame = RgbImage::new(4, 4);
    let annotated = annotator.detect(&frame).unwrap();
    assert_eq!(annotated.dimensions(), frame.dimensions());
    assert_eq!(annotated.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
    assert_eq!(annotator.model.calls.get(), 1);
  }
}
