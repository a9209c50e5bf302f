// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/args.rs - 命令行参数
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

use std::path::PathBuf;

use clap::Parser;

use yolo_fps::input::CameraSpec;

pub const DEFAULT_MODEL: &str = "yolo26n.rknn";

/// YoloFps 实时检测与帧率预览
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// RKNN 模型文件路径
  #[arg(long, value_name = "MODEL", default_value = DEFAULT_MODEL)]
  pub model: PathBuf,

  /// 输入来源
  /// 支持格式:
  /// - 摄像头编号: 0, 1, ...
  /// - 文件: 视频文件或图片 (*.jpg, *.png 等)
  /// - URL: gst://camera/dev/video0?fps=30, gst://file/path/to/video.mp4, image:///path/to/image.jpg
  #[arg(long, value_name = "INDEX_OR_PATH", default_value = "0")]
  pub camera: CameraSpec,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_to_first_camera_and_nano_model() {
    let args = Args::try_parse_from(["yolo-fps"]).unwrap();
    assert_eq!(args.model, PathBuf::from(DEFAULT_MODEL));
    assert_eq!(args.camera, CameraSpec::Index(0));
  }

  #[test]
  fn camera_accepts_index_and_path() {
    let args = Args::try_parse_from(["yolo-fps", "--camera", "2"]).unwrap();
    assert_eq!(args.camera, CameraSpec::Index(2));

    let args =
      Args::try_parse_from(["yolo-fps", "--model", "m.rknn", "--camera", "clip.mp4"]).unwrap();
    assert_eq!(args.model, PathBuf::from("m.rknn"));
    assert_eq!(args.camera, CameraSpec::Path(PathBuf::from("clip.mp4")));
  }

  #[test]
  fn unknown_flag_is_rejected() {
    assert!(Args::try_parse_from(["yolo-fps", "--input", "0"]).is_err());
  }
}
