// 该文件是 Xunwu （寻物） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::debug;

use crate::{
  frame::Frame,
  model::{DetectItem, DetectResult, WithLabel},
  output::RenderError,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_HEIGHT: i32 = 22;
const LABEL_CHAR_WIDTH: f32 = 10.0; // 没有字体时按字符数估算标签宽度
const LABEL_TEXT_PADDING: i32 = 2;
const TEXT_COLOR: [u8; 3] = [255, 255, 255];
const SIMILAR_COLOR: [u8; 3] = [0, 0, 255]; // 图像引导结果统一用蓝色
const PALETTE_SIZE: usize = 10;

/// 内置字体，--font 可替换
const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  label_text_height: i32,
  label_char_width: f32,
  label_text_padding: i32,
  palette: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    let font = FontVec::try_from_vec(BUNDLED_FONT.to_vec()).expect("无法加载嵌入的字体文件");
    Self::with_font(Some(font))
  }
}

fn load_font(path: &Path) -> Result<FontVec, RenderError> {
  let data = std::fs::read(path)?;
  FontVec::try_from_vec(data)
    .map_err(|e| RenderError::InvalidFont(format!("{}: {}", path.display(), e)))
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl Draw {
  fn with_font(font: Option<FontVec>) -> Self {
    let palette = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb(i as f32 / PALETTE_SIZE as f32 * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_text_height: LABEL_TEXT_HEIGHT,
      label_char_width: LABEL_CHAR_WIDTH,
      label_text_padding: LABEL_TEXT_PADDING,
      palette,
    }
  }

  /// 从 TTF/OTF 文件加载字体
  pub fn from_font_file(path: &Path) -> Result<Self, RenderError> {
    let font = load_font(path)?;
    debug!("使用字体: {}", path.display());
    Ok(Self::with_font(Some(font)))
  }

  /// 不绘制文字，只画边框与标签背景
  pub fn without_font() -> Self {
    Self::with_font(None)
  }

  pub fn color_for<T: WithLabel>(&self, kind: &T) -> Rgb<u8> {
    match kind.color_index() {
      Some(index) => self.palette[index % self.palette.len()],
      None => Rgb(SIMILAR_COLOR),
    }
  }

  fn label_width(&self, label: &str, scale: PxScale) -> i32 {
    match &self.font {
      Some(font) => text_size(scale, font, label).0 as i32 + 2 * self.label_text_padding,
      None => (label.chars().count() as f32 * self.label_char_width) as i32,
    }
  }

  // bbox 为像素坐标 [x_min, y_min, x_max, y_max]
  fn draw_bbox_with_label<T: WithLabel>(&self, image: &mut RgbImage, item: &DetectItem<T>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return;
    }
    let color = self.color_for(&item.kind);
    let bbox = &item.bbox;

    let x_min = (bbox[0].floor() as i32).clamp(0, w - 1);
    let y_min = (bbox[1].floor() as i32).clamp(0, h - 1);
    let x_max = (bbox[2].ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox[3].ceil() as i32).clamp(0, h - 1);

    // 退化框也至少画出一个像素
    let box_width = (x_max - x_min + 1).max(1) as u32;
    let box_height = (y_max - y_min + 1).max(1) as u32;

    // 边框加粗为2像素
    draw_hollow_rect_mut(
      image,
      Rect::at(x_min, y_min).of_size(box_width, box_height),
      color,
    );
    if box_width > 2 && box_height > 2 {
      draw_hollow_rect_mut(
        image,
        Rect::at(x_min + 1, y_min + 1).of_size(box_width - 2, box_height - 2),
        color,
      );
    }

    let label = format!("{} {:.2}", item.kind.to_label_str(), item.score);
    let scale = PxScale::from(self.font_size);

    // 标签放在边框上方，空间不够时贴着图像顶部
    let label_x = x_min;
    let label_y = (y_min - self.label_text_height).max(0);
    let label_width = self.label_width(&label, scale).min(w - label_x);
    let label_height = self.label_text_height.min(h - label_y);
    if label_width <= 0 || label_height <= 0 {
      return;
    }

    draw_filled_rect_mut(
      image,
      Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32),
      color,
    );

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        label_x + self.label_text_padding,
        label_y + self.label_text_padding,
        scale,
        font,
        &label,
      );
    }
  }

  pub fn draw_detections_on_image<T: WithLabel>(
    &self,
    image: &mut RgbImage,
    result: &DetectResult<T>,
  ) {
    // 低分先画，高分的框压在上面
    for item in result.iter().rev() {
      self.draw_bbox_with_label(image, item);
    }
  }

  pub fn draw_detection<T: WithLabel>(&self, frame: &Frame, result: &DetectResult<T>) -> RgbImage {
    let mut image = frame.as_rgb_image().clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }
}
