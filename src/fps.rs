// 该文件是 YoloFps （帧率预览） 项目的一部分。
// src/fps.rs - 滑动窗口帧率统计
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

use std::time::Instant;

/// 帧率平滑窗口大小
pub const FPS_WINDOW: usize = 10;

/// 最近 N 帧的帧间耗时（秒），定长环形缓冲区
///
/// 缓冲区长度恒为 `N`，未写入的槽位为 0，写入位置按 `(index + 1) % N` 轮转。
#[derive(Debug, Clone)]
pub struct RecentLatencies<const N: usize> {
  slots: [f64; N],
  index: usize,
}

impl<const N: usize> Default for RecentLatencies<N> {
  fn default() -> Self {
    Self {
      slots: [0.0; N],
      index: 0,
    }
  }
}

impl<const N: usize> RecentLatencies<N> {
  pub fn push(&mut self, latency: f64) {
    self.slots[self.index] = latency;
    self.index = (self.index + 1) % N;
  }

  /// 所有槽位的算术平均，未填满时 0 值槽位同样参与计算
  pub fn mean(&self) -> f64 {
    self.slots.iter().sum::<f64>() / N as f64
  }

  pub fn len(&self) -> usize {
    N
  }

  pub fn is_empty(&self) -> bool {
    N == 0
  }

  /// 下一次写入的位置
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn as_slice(&self) -> &[f64] {
    &self.slots
  }
}

/// 平均帧间耗时换算为帧率，平均值不大于 0 时返回 0
pub fn smoothed_fps(mean: f64) -> f64 {
  if mean > 0.0 { 1.0 / mean } else { 0.0 }
}

/// 叠加在画面上的帧率文本
pub fn fps_label(fps: f64) -> String {
  format!("FPS: {:.2}", fps)
}

/// 帧率计量器
///
/// 持有最近的帧间耗时与上一帧完成时刻。
#[derive(Debug, Clone, Default)]
pub struct FpsMeter {
  latencies: RecentLatencies<FPS_WINDOW>,
  previous: Option<Instant>,
  fps: f64,
}

impl FpsMeter {
  pub fn new() -> Self {
    Self::default()
  }

  /// 设置计时起点
  pub fn start(&mut self, now: Instant) {
    self.previous = Some(now);
  }

  /// 记录一帧完成时刻，返回平滑后的帧率
  pub fn tick(&mut self, now: Instant) -> f64 {
    let previous = self.previous.replace(now).unwrap_or(now);
    let elapsed = now.saturating_duration_since(previous).as_secs_f64();
    self.record(elapsed)
  }

  /// 直接记录一个帧间耗时（秒），返回平滑后的帧率
  pub fn record(&mut self, elapsed: f64) -> f64 {
    self.latencies.push(elapsed);
    self.fps = smoothed_fps(self.latencies.mean());
    self.fps
  }

  pub fn fps(&self) -> f64 {
    self.fps
  }

  pub fn latencies(&self) -> &RecentLatencies<FPS_WINDOW> {
    &self.latencies
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  const EPS: f64 = 1e-9;

  #[test]
  fn latencies_start_zeroed_with_fixed_length() {
    let latencies = RecentLatencies::<FPS_WINDOW>::default();
    assert_eq!(latencies.len(), FPS_WINDOW);
    assert!(latencies.as_slice().iter().all(|&v| v == 0.0));
    assert_eq!(latencies.mean(), 0.0);
  }

  #[test]
  fn write_index_wraps_round_robin() {
    let mut latencies = RecentLatencies::<3>::default();
    for v in [1.0, 2.0, 3.0, 4.0] {
      latencies.push(v);
    }
    assert_eq!(latencies.index(), 1);
    assert_eq!(latencies.as_slice(), &[4.0, 2.0, 3.0]);
  }

  #[test]
  fn full_window_ignores_older_samples() {
    let mut meter = FpsMeter::new();
    for _ in 0..7 {
      meter.record(5.0);
    }
    let recent = [0.02, 0.04, 0.03, 0.05, 0.01, 0.02, 0.03, 0.04, 0.05, 0.01];
    let mut fps = 0.0;
    for v in recent {
      fps = meter.record(v);
    }
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    assert!((fps - 1.0 / mean).abs() < EPS);
  }

  #[test]
  fn warm_up_keeps_zero_slots_in_mean() {
    let mut meter = FpsMeter::new();
    // 0.5 / 10 = 0.05
    let fps = meter.record(0.5);
    assert!((fps - 20.0).abs() < EPS);
  }

  #[test]
  fn constant_latency_is_stable() {
    let mut meter = FpsMeter::new();
    for _ in 0..25 {
      meter.record(0.04);
    }
    assert!((meter.fps() - 25.0).abs() < 1e-6);
  }

  #[test]
  fn all_zero_latencies_report_zero() {
    let mut meter = FpsMeter::new();
    for _ in 0..FPS_WINDOW {
      assert_eq!(meter.record(0.0), 0.0);
    }
  }

  #[test]
  fn tenth_of_a_second_reads_ten_fps() {
    let mut meter = FpsMeter::new();
    for _ in 0..FPS_WINDOW {
      meter.record(0.1);
    }
    assert_eq!(fps_label(meter.fps()), "FPS: 10.00");
  }

  #[test]
  fn tick_measures_from_previous_timestamp() {
    let mut meter = FpsMeter::new();
    let t0 = Instant::now();
    meter.start(t0);
    meter.tick(t0 + Duration::from_millis(100));
    meter.tick(t0 + Duration::from_millis(300));
    let slots = meter.latencies().as_slice();
    assert!((slots[0] - 0.1).abs() < 1e-6);
    assert!((slots[1] - 0.2).abs() < 1e-6);
  }

  #[test]
  fn tick_without_start_records_zero() {
    let mut meter = FpsMeter::new();
    assert_eq!(meter.tick(Instant::now()), 0.0);
  }
}
