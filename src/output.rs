// 该文件是 Xunwu （寻物） 项目的一部分。
// src/output.rs - 输出定义
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

use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use thiserror::Error;
use tracing::debug;

use crate::{
  frame::Frame,
  model::{DetectResult, WithLabel},
};

pub trait Render<Frame, Output> {
  type Output;
  type Error;
  fn render_result(&self, frame: &Frame, result: &Output) -> Result<Self::Output, Self::Error>;
}

pub mod draw;
mod save_image_file;
mod table;

pub use self::draw::Draw;
pub use self::save_image_file::{SaveImageFileOutput, SavedImage};
pub use self::table::{SummaryRow, SummaryTable, TableFormat};

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("图像编码失败: {0}")]
  Encode(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("结果表序列化失败: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("无法加载字体: {0}")]
  InvalidFont(String),
  #[error("未知的结果表格式: {0}")]
  UnknownTableFormat(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("结果表会覆盖输出图像: {0}")]
  PathConflict(String),
}

/// 一次渲染的全部产物
#[derive(Debug, Clone)]
pub struct Rendered {
  pub image: RgbImage,
  pub png: Vec<u8>,
  pub table: SummaryTable,
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
  let mut png = Vec::new();
  image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
  Ok(png)
}

/// 在内存中完成渲染，不写文件
#[derive(Default)]
pub struct Renderer {
  draw: Draw,
}

impl Renderer {
  pub fn new(draw: Draw) -> Self {
    Self { draw }
  }

  pub fn render<T: WithLabel>(
    &self,
    frame: &Frame,
    result: &DetectResult<T>,
  ) -> Result<Rendered, RenderError> {
    let image = self.draw.draw_detection(frame, result);
    let png = encode_png(&image)?;
    debug!("PNG 编码完成: {} 字节", png.len());

    Ok(Rendered {
      image,
      png,
      table: SummaryTable::from_result(result),
    })
  }
}

impl<T: WithLabel> Render<Frame, DetectResult<T>> for Renderer {
  type Output = Rendered;
  type Error = RenderError;

  fn render_result(
    &self,
    frame: &Frame,
    result: &DetectResult<T>,
  ) -> Result<Self::Output, Self::Error> {
    self.render(frame, result)
  }
}
