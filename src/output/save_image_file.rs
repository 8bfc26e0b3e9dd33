// 该文件是 Xunwu （寻物） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectResult, WithLabel},
  output::{Draw, Render, RenderError, Rendered, Renderer, TableFormat},
};

pub struct SaveImageFileOutput {
  path: PathBuf,
  table: TableFormat,
  renderer: Renderer,
}

/// 保存结果：渲染产物与写出的文件
#[derive(Debug, Clone)]
pub struct SavedImage {
  pub rendered: Rendered,
  pub image_path: PathBuf,
  pub table_path: Option<PathBuf>,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = RenderError;

  /// `image:///out/result.png?table=json`，也接受 `file://`
  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME && uri.scheme() != "file" {
      return Err(RenderError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    let path = urlencoding::decode(uri.path())
      .map_err(|e| RenderError::SchemeMismatch(e.to_string()))?
      .into_owned();

    let table = match uri.query_pairs().find(|(k, _)| k == "table") {
      Some((_, v)) => v.parse()?,
      None => TableFormat::default(),
    };

    Ok(SaveImageFileOutput::new(PathBuf::from(path)).with_table(table))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: PathBuf) -> Self {
    Self {
      path,
      table: TableFormat::default(),
      renderer: Renderer::default(),
    }
  }

  pub fn with_table(mut self, table: TableFormat) -> Self {
    self.table = table;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.renderer = Renderer::new(draw);
    self
  }

  /// 目标为目录时按时间生成文件名
  pub fn target_path(&self) -> PathBuf {
    if self.path.is_dir() || self.path.as_os_str().to_string_lossy().ends_with('/') {
      let filename = format!("detection-{}.png", Local::now().format("%Y%m%d-%H%M%S"));
      self.path.join(filename)
    } else {
      self.path.clone()
    }
  }

  pub fn save(&self, rendered: Rendered) -> Result<SavedImage, RenderError> {
    let image_path = self.target_path();
    let table_path = self
      .table
      .extension()
      .map(|extension| image_path.with_extension(extension));
    if table_path.as_ref() == Some(&image_path) {
      return Err(RenderError::PathConflict(image_path.display().to_string()));
    }

    if let Some(parent) = Path::new(&image_path).parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    std::fs::write(&image_path, &rendered.png)?;
    warn!("保存图像到文件: {}", image_path.display());

    let table_path = match (rendered.table.export(self.table)?, table_path) {
      (Some(text), Some(table_path)) => {
        std::fs::write(&table_path, text)?;
        warn!("保存结果表到文件: {}", table_path.display());
        Some(table_path)
      }
      _ => None,
    };

    Ok(SavedImage {
      rendered,
      image_path,
      table_path,
    })
  }
}

impl<T: WithLabel> Render<Frame, DetectResult<T>> for SaveImageFileOutput {
  type Output = SavedImage;
  type Error = RenderError;

  fn render_result(
    &self,
    frame: &Frame,
    result: &DetectResult<T>,
  ) -> Result<Self::Output, Self::Error> {
    let rendered = self.renderer.render(frame, result)?;
    self.save(rendered)
  }
}
