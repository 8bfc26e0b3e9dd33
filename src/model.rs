// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model.rs - 模型与检测适配
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

use thiserror::Error;
use tracing::{debug, error, info};

use crate::frame::Frame;

mod catalog;
pub mod nms;
mod query;
pub mod translate;

#[cfg(feature = "model_owlvit")]
mod owlvit;

pub use self::catalog::ModelVariant;
pub use self::query::{MAX_QUERY_CHARS, MAX_TEXT_QUERIES, Query, TextQuery};
pub use self::translate::{TranslateMode, Translator};

#[cfg(feature = "model_owlvit")]
pub use self::owlvit::{OwlVit, OwlVitBuilder};

pub const DEFAULT_CONFIDENCE: f32 = 0.1;
pub const DEFAULT_OVERLAP: f32 = 0.3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
  #[error("文本查询为空")]
  EmptyQuery,
  #[error("不能使用空白的文本查询")]
  BlankQuery,
  #[error("文本查询至少需要 2 个字符: {0:?}")]
  QueryTooShort(String),
  #[error("缺少查询图像")]
  EmptyQueryImage,
  #[error("{name} 必须在 [0, 1] 范围内，实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
}

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("未知的模型: {0}")]
  UnknownModel(String),
  #[error("模型加载错误: {0}")]
  ModelLoad(String),
  #[error("模型不可用: {0}")]
  ModelUnavailable(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("模型输出无效: {0}")]
  MalformedOutput(String),
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("输入校验失败: {0}")]
  Validation(#[from] ValidationError),
  #[error("检测失败: {0}")]
  Detection(#[from] DetectionError),
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  /// 用于选取颜色的编号，None 使用默认颜色
  fn color_index(&self) -> Option<usize>;
}

/// 检测标签：文本模式下为来源查询，图像模式下没有文字标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Label {
  Query { index: usize, text: String },
  Similar,
}

impl WithLabel for Label {
  fn to_label_str(&self) -> String {
    match self {
      Label::Query { text, .. } => text.clone(),
      Label::Similar => "similar object".to_string(),
    }
  }

  fn color_index(&self) -> Option<usize> {
    match self {
      Label::Query { index, .. } => Some(*index),
      Label::Similar => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem<T> {
  pub kind: T,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，像素坐标
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectResult<T> {
  pub items: Box<[DetectItem<T>]>,
}

impl<T> DetectResult<T> {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem<T>> {
    self.items.iter()
  }
}

/// 模型原始输出的一个 (区域, 查询) 对
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPrediction {
  pub bbox: [f32; 4], // [cx, cy, w, h]，相对输入图像归一化
  pub score: f32,
  /// 文本模式下的查询下标，图像模式为 None
  pub query_index: Option<usize>,
}

/// 单次请求的阈值设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
  pub confidence: f32,
  pub overlap: f32,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE,
      overlap: DEFAULT_OVERLAP,
    }
  }
}

impl Settings {
  pub fn new(confidence: f32, overlap: f32) -> Self {
    Self {
      confidence,
      overlap,
    }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    for (name, value) in [("confidence", self.confidence), ("overlap", self.overlap)] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::ThresholdOutOfRange { name, value });
      }
    }
    Ok(())
  }
}

/// 预训练检测模型的调用边界，加载后只读复用
pub trait Model {
  fn infer(&self, frame: &Frame, query: &Query) -> Result<Vec<RawPrediction>, DetectionError>;
}

impl<M: Model + ?Sized> Model for &M {
  fn infer(&self, frame: &Frame, query: &Query) -> Result<Vec<RawPrediction>, DetectionError> {
    (**self).infer(frame, query)
  }
}

impl<M: Model + ?Sized> Model for Box<M> {
  fn infer(&self, frame: &Frame, query: &Query) -> Result<Vec<RawPrediction>, DetectionError> {
    (**self).infer(frame, query)
  }
}

/// 检测适配器：校验、推理、阈值过滤与 NMS
pub struct Detector<M> {
  model: M,
}

impl<M: Model> Detector<M> {
  pub fn new(model: M) -> Self {
    Self { model }
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn detect(
    &self,
    frame: &Frame,
    query: &Query,
    settings: &Settings,
  ) -> Result<DetectResult<Label>, ModelError> {
    settings.validate()?;
    query.validate()?;

    info!("开始推理...");
    let now = std::time::Instant::now();
    let raw = self.model.infer(frame, query).inspect_err(|e| {
      error!("推理失败: {}", e);
    })?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    debug!("模型输出 {} 个候选", raw.len());

    let candidates = adapt_predictions(&raw, frame, query, settings.confidence)?;
    debug!(
      "置信度 >= {:.3} 的候选: {}",
      settings.confidence,
      candidates.len()
    );

    let items = nms::non_max_suppression(candidates, settings.overlap);
    info!("检测到 {} 个物体", items.len());

    Ok(DetectResult {
      items: items.into_boxed_slice(),
    })
  }
}

/// 检查原始输出，换算到像素坐标并按置信度过滤
fn adapt_predictions(
  raw: &[RawPrediction],
  frame: &Frame,
  query: &Query,
  confidence: f32,
) -> Result<Vec<DetectItem<Label>>, DetectionError> {
  let (width, height) = (frame.width() as f32, frame.height() as f32);
  let mut items = Vec::new();

  for (i, prediction) in raw.iter().enumerate() {
    validate_prediction(i, prediction, query)?;
    if prediction.score < confidence {
      continue;
    }

    let kind = match (query, prediction.query_index) {
      (Query::Text(queries), Some(index)) => Label::Query {
        index,
        text: queries[index].label(),
      },
      _ => Label::Similar,
    };

    let [cx, cy, w, h] = prediction.bbox;
    let bbox = [
      ((cx - w / 2.0) * width).clamp(0.0, width),
      ((cy - h / 2.0) * height).clamp(0.0, height),
      ((cx + w / 2.0) * width).clamp(0.0, width),
      ((cy + h / 2.0) * height).clamp(0.0, height),
    ];

    items.push(DetectItem {
      kind,
      score: prediction.score,
      bbox,
    });
  }

  Ok(items)
}

fn validate_prediction(
  i: usize,
  prediction: &RawPrediction,
  query: &Query,
) -> Result<(), DetectionError> {
  if !prediction.score.is_finite() || !(0.0..=1.0).contains(&prediction.score) {
    return Err(DetectionError::MalformedOutput(format!(
      "第 {} 个候选的分数无效: {}",
      i, prediction.score
    )));
  }

  if prediction.bbox.iter().any(|v| !v.is_finite()) || prediction.bbox[2] < 0.0 || prediction.bbox[3] < 0.0
  {
    return Err(DetectionError::MalformedOutput(format!(
      "第 {} 个候选的边界框无效: {:?}",
      i, prediction.bbox
    )));
  }

  match (query, prediction.query_index) {
    (Query::Text(queries), Some(index)) if index < queries.len() => Ok(()),
    (Query::Image(_), None) => Ok(()),
    (_, index) => Err(DetectionError::MalformedOutput(format!(
      "第 {} 个候选的查询下标无效: {:?}",
      i, index
    ))),
  }
}
