// 该文件是 Xunwu （寻物） 项目的一部分。
// src/frame.rs - 规范化 RGB 帧定义
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

/// 流水线各阶段之间传递的图像，固定为 RGB8。
///
/// 交给检测器之后只会被借用，不会被修改。
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  image: RgbImage,
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Self { image }
  }
}

impl Frame {
  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn is_empty(&self) -> bool {
    self.image.width() == 0 || self.image.height() == 0
  }

  pub fn as_rgb_image(&self) -> &RgbImage {
    &self.image
  }

  /// 缩放到 `side x side` 并按通道做 `(x / 255 - mean) / std`，输出 NCHW 排列的 f32 数据
  pub fn to_normalized_nchw(&self, side: u32, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    let resized = if self.image.dimensions() == (side, side) {
      self.image.clone()
    } else {
      image::imageops::resize(&self.image, side, side, FilterType::CatmullRom)
    };

    let plane = (side as usize) * (side as usize);
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
      let idx = (y as usize) * (side as usize) + (x as usize);
      for c in 0..RGB_CHANNELS {
        let value = pixel[c] as f32 / 255.0;
        data[c * plane + idx] = (value - mean[c]) / std[c];
      }
    }

    data
  }
}
