// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/model/yolo26.rs - YOLO26 检测模型
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

use std::{marker::PhantomData, path::PathBuf};

use image::RgbImage;
use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  frame::{AsNhwcFrame, RgbNhwcFrame},
  model::{DetectItem, DetectResult, Model, WithLabel},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_CLASS_NUM: usize = 80;
const YOLO26_INPUT_W: f32 = 640.0;
const YOLO26_INPUT_H: f32 = 640.0;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];
const YOLO26_OBJECT_THRESH: f32 = 0.5;

/// 模型输入帧
type Yolo26Frame = RgbNhwcFrame<640, 640>;

pub struct Yolo26<T> {
  context: Context,
  object_thresh: f32,
  _phantom: PhantomData<T>,
}

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
}

impl From<rknpu::Error> for Yolo26Error {
  fn from(err: rknpu::Error) -> Self {
    Yolo26Error::RknnError(err)
  }
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26Builder {
  model_path: PathBuf,
  flags: InitFlags,
  object_thresh: f32,
}

impl Yolo26Builder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Yolo26Builder {
      model_path: model_path.into(),
      flags: InitFlags::default(),
      object_thresh: YOLO26_OBJECT_THRESH,
    }
  }

  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  /// 目标置信度阈值 (0.0 - 1.0)
  pub fn object_thresh(mut self, thresh: f32) -> Self {
    self.object_thresh = thresh;
    self
  }

  pub fn build<T: WithLabel>(self) -> Result<Yolo26<T>, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path.display());
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    check_io_count("输入", YOLO26_NUM_INPUTS, num_inputs)?;
    check_io_count("输出", YOLO26_NUM_OUTPUTS, num_outputs)?;

    info!("模型加载完成");
    Ok(Yolo26 {
      context,
      object_thresh: self.object_thresh,
      _phantom: PhantomData,
    })
  }
}

fn check_io_count(kind: &str, expected: u32, actual: u32) -> Result<(), Yolo26Error> {
  if expected == actual {
    debug!("模型{}数量: {}", kind, actual);
    return Ok(());
  }
  let msg = format!("预期模型{}数量为 {}, 实际为 {}", kind, expected, actual);
  error!("{}", msg);
  Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel))
}

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
  head_idx: usize,
) -> Option<(&'a [f32], &'a [f32])> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Some((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Some((tensor2, tensor1))
  } else {
    error!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}, 期望分类: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected,
      cls_expected
    );
    None
  }
}

/// 解码单个检测头，结果追加到 `items`
///
/// `reg` 为 `[4, H, W]` 的 ltrb 距离，`cls` 为 `[C, H, W]` 的分类 logit。
fn decode_head<T: WithLabel>(
  reg: &[f32],
  cls: &[f32],
  (map_h, map_w): (usize, usize),
  stride: f32,
  object_thresh: f32,
  items: &mut Vec<DetectItem<T>>,
) {
  let spatial = map_h * map_w;

  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let (max_logit, class_id) = (0..YOLO26_CLASS_NUM)
        .map(|c| (cls[c * spatial + idx], c as u32))
        .fold((f32::MIN, 0), |best, cur| if cur.0 > best.0 { cur } else { best });
      let score = sigmoid(max_logit);

      if score <= object_thresh {
        continue;
      }

      let grid_x = (w as f32) + 0.5;
      let grid_y = (h as f32) + 0.5;

      let xmin = ((grid_x - reg[idx]) * stride).clamp(0.0, YOLO26_INPUT_W);
      let ymin = ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_H);
      let xmax = ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_W);
      let ymax = ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_H);

      items.push(DetectItem {
        kind: T::from_label_id(class_id),
        score,
        bbox: [
          xmin / YOLO26_INPUT_W,
          ymin / YOLO26_INPUT_H,
          xmax / YOLO26_INPUT_W,
          ymax / YOLO26_INPUT_H,
        ],
      });
    }
  }
}

impl<T: WithLabel> Yolo26<T> {
  fn postprocess(&self, output: rknpu::Output) -> DetectResult<T> {
    let mut items = Vec::new();

    for (head_idx, (&size, stride)) in YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate() {
      let spatial = size.0 * size.1;

      // RKNN 输出顺序不固定，按张量大小区分回归与分类
      let output_idx1 = head_idx * 2;
      let output_idx2 = head_idx * 2 + 1;

      let (tensor1, tensor2) = match (output.get_f32(output_idx1), output.get_f32(output_idx2)) {
        (Ok(t1), Ok(t2)) => (t1, t2),
        (Err(e), _) | (_, Err(e)) => {
          error!("获取检测头 {} 输出失败: {}", head_idx, e);
          continue;
        }
      };

      let Some((reg, cls)) = match_reg_cls_tensors(
        tensor1,
        tensor2,
        4 * spatial,
        YOLO26_CLASS_NUM * spatial,
        head_idx,
      ) else {
        continue;
      };

      decode_head(reg, cls, size, stride, self.object_thresh, &mut items);
    }

    debug!("检测到 {} 个物体", items.len());

    DetectResult {
      items: items.into_boxed_slice(),
    }
  }
}

impl<T: WithLabel> Model for Yolo26<T> {
  type Input = RgbImage;
  type Output = DetectResult<T>;
  type Error = Yolo26Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let frame = Yolo26Frame::resized_from(input);

    self.context.set_input(
      0,
      frame.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    Ok(self.postprocess(output))
  }
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::CocoLabel;

  #[test]
  fn swapped_outputs_are_matched_by_size() {
    let reg = vec![0.0; 4];
    let cls = vec![0.0; 80];
    let (r, c) = match_reg_cls_tensors(&cls, &reg, 4, 80, 0).unwrap();
    assert_eq!(r.len(), 4);
    assert_eq!(c.len(), 80);
    assert!(match_reg_cls_tensors(&reg, &reg, 4, 80, 0).is_none());
  }

  #[test]
  fn single_cell_head_decodes_box() {
    // 1x1 特征图，stride 32
    let reg = [0.5, 0.5, 1.5, 0.5];
    let mut cls = vec![-10.0; YOLO26_CLASS_NUM];
    cls[2] = 5.0;
    let mut items: Vec<DetectItem<CocoLabel>> = Vec::new();
    decode_head(&reg, &cls, (1, 1), 32.0, 0.5, &mut items);

    assert_eq!(items.len(), 1);
    let item = &items[0];
    assert_eq!(item.kind, CocoLabel(2));
    assert!(item.score > 0.99);
    assert_eq!(
      item.bbox,
      [0.0, 0.0, 64.0 / YOLO26_INPUT_W, 32.0 / YOLO26_INPUT_H]
    );
  }

  #[test]
  fn low_scores_are_dropped() {
    let reg = [0.5; 4];
    let cls = vec![-1.0; YOLO26_CLASS_NUM];
    let mut items: Vec<DetectItem<CocoLabel>> = Vec::new();
    decode_head(&reg, &cls, (1, 1), 8.0, 0.5, &mut items);
    assert!(items.is_empty());
  }
}
