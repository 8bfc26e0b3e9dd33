// 该文件是 Xunwu （寻物） 项目的一部分。
// src/input/normalize.rs - 图像解码与规范化
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

use image::{DynamicImage, ImageFormat, imageops::FilterType};
use tracing::debug;

use crate::{frame::Frame, input::LoadError};

pub const SUPPORTED_FORMATS: [ImageFormat; 4] = [
  ImageFormat::Png,
  ImageFormat::Jpeg,
  ImageFormat::Bmp,
  ImageFormat::Tiff,
];

/// 根据内容判断格式并解码
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, LoadError> {
  let format = image::guess_format(bytes)
    .map_err(|_| LoadError::UnsupportedFormat("无法识别".to_string()))?;

  if !SUPPORTED_FORMATS.contains(&format) {
    return Err(LoadError::UnsupportedFormat(format!("{:?}", format)));
  }

  debug!("图像格式: {:?}", format);
  image::load_from_memory_with_format(bytes, format).map_err(LoadError::Decode)
}

/// 转为 RGB8，检查最小尺寸，超过上限时等比缩小
pub fn normalize(
  image: DynamicImage,
  max_size: (u32, u32),
  min_side: u32,
) -> Result<Frame, LoadError> {
  let rgb = image.to_rgb8();
  let (width, height) = rgb.dimensions();

  if width < min_side || height < min_side {
    return Err(LoadError::TooSmall {
      width,
      height,
      min: min_side,
    });
  }

  if width <= max_size.0 && height <= max_size.1 {
    return Ok(Frame::from(rgb));
  }

  let (new_width, new_height) = fit_within(width, height, max_size.0, max_size.1);
  debug!(
    "缩小图像: {}x{} -> {}x{}",
    width, height, new_width, new_height
  );
  let resized = image::imageops::resize(&rgb, new_width, new_height, FilterType::Lanczos3);
  Ok(Frame::from(resized))
}

/// 保持宽高比放入 `max_width x max_height`，不会放大
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
  if width <= max_width && height <= max_height {
    return (width, height);
  }

  let scale = f64::min(
    max_width as f64 / width as f64,
    max_height as f64 / height as f64,
  );
  let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width.max(1));
  let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height.max(1));
  (new_width, new_height)
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage, Rgba, RgbaImage};
  use std::io::Cursor;

  fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
  }

  #[test]
  fn fit_within_preserves_aspect_ratio() {
    assert_eq!(fit_within(1600, 1200, 800, 800), (800, 600));
    assert_eq!(fit_within(600, 2400, 800, 800), (200, 800));
    assert_eq!(fit_within(640, 480, 800, 800), (640, 480));
  }

  #[test]
  fn large_image_is_downscaled() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(1000, 500));
    let frame = normalize(image, (800, 800), 100).unwrap();
    assert_eq!((frame.width(), frame.height()), (800, 400));
  }

  #[test]
  fn small_image_is_rejected() {
    let image = DynamicImage::ImageRgb8(RgbImage::new(120, 40));
    assert!(matches!(
      normalize(image, (800, 800), 100),
      Err(LoadError::TooSmall {
        width: 120,
        height: 40,
        min: 100
      })
    ));
  }

  #[test]
  fn alpha_is_dropped() {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(128, 128, Rgba([10, 20, 30, 0])));
    let frame = normalize(image, (800, 800), 100).unwrap();
    assert_eq!(frame.as_rgb_image().get_pixel(0, 0), &Rgb([10, 20, 30]));
  }

  #[test]
  fn decodes_png_bytes() {
    let bytes = encode(
      DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]))),
      ImageFormat::Png,
    );
    let image = decode_image(&bytes).unwrap();
    assert_eq!(image.width(), 4);
  }

  #[test]
  fn truncated_png_is_decode_error() {
    let mut bytes = encode(
      DynamicImage::ImageRgb8(RgbImage::new(16, 16)),
      ImageFormat::Png,
    );
    bytes.truncate(20);
    assert!(matches!(decode_image(&bytes), Err(LoadError::Decode(_))));
  }

  #[test]
  fn gif_is_unsupported() {
    assert!(matches!(
      decode_image(b"GIF89a\x01\x00\x01\x00"),
      Err(LoadError::UnsupportedFormat(_))
    ));
  }
}
