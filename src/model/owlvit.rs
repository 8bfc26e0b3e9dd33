// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/owlvit.rs - OWL-ViT ONNX 推理后端
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

use std::{
  fmt::Display,
  path::{Path, PathBuf},
  sync::Mutex,
};

use hf_hub::api::sync::{Api, ApiBuilder};
use ndarray::{Array2, Array4, ArrayViewD, Ix3};
use ort::{
  session::{Session, builder::GraphOptimizationLevel},
  value::Value,
};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::{DetectionError, Model, ModelVariant, Query, RawPrediction, TextQuery},
};

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_1];
const TEXT_MAX_LENGTH: usize = 16;
const PAD_TOKEN: &str = "!";
const DEFAULT_INTRA_THREADS: usize = 4;

const MODEL_FILE: &str = "model.onnx";
const HUB_MODEL_FILE: &str = "onnx/model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const IMAGE_GUIDED_FILE: &str = "image_guided.onnx";

fn load_error(e: impl Display) -> DetectionError {
  DetectionError::ModelLoad(e.to_string())
}

fn inference_error(e: impl Display) -> DetectionError {
  DetectionError::Inference(e.to_string())
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

struct ModelFiles {
  model: PathBuf,
  tokenizer: PathBuf,
  image_guided: Option<PathBuf>,
}

pub struct OwlVitBuilder {
  variant: ModelVariant,
  model_dir: Option<PathBuf>,
  cache_dir: Option<PathBuf>,
  image_guided: Option<PathBuf>,
  intra_threads: usize,
}

impl FromUrlWithScheme for OwlVitBuilder {
  const SCHEME: &'static str = "owlvit";
}

impl FromUrl for OwlVitBuilder {
  type Error = DetectionError;

  /// `owlvit:base-patch32` 从模型仓库获取，`owlvit:///models/owl?variant=base-patch16` 使用本地目录
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectionError::ModelLoad(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let variant_param = url
      .query_pairs()
      .find(|(k, _)| k == "variant")
      .map(|(_, v)| v.into_owned());

    let path = url.path();
    if path.starts_with('/') {
      let variant = match variant_param {
        Some(name) => name.parse()?,
        None => ModelVariant::default(),
      };
      let dir = urlencoding::decode(path).map_err(load_error)?;
      Ok(OwlVitBuilder::new(variant).model_dir(PathBuf::from(dir.into_owned())))
    } else {
      Ok(OwlVitBuilder::new(path.parse()?))
    }
  }
}

impl OwlVitBuilder {
  pub fn new(variant: ModelVariant) -> Self {
    Self {
      variant,
      model_dir: None,
      cache_dir: None,
      image_guided: None,
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  /// 本地模型目录，需包含 model.onnx 与 tokenizer.json，可选 image_guided.onnx
  pub fn model_dir(mut self, dir: PathBuf) -> Self {
    self.model_dir = Some(dir);
    self
  }

  pub fn cache_dir(mut self, dir: Option<PathBuf>) -> Self {
    self.cache_dir = dir;
    self
  }

  pub fn image_guided(mut self, path: Option<PathBuf>) -> Self {
    self.image_guided = path;
    self
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads.max(1);
    self
  }

  pub fn build(self) -> Result<OwlVit, DetectionError> {
    info!("加载模型: {}", self.variant);
    let files = self.resolve_files().inspect_err(|e| error!("{}", e))?;

    let session = self.create_session(&files.model)?;
    let input_names: Vec<&str> = session.inputs.iter().map(|input| input.name.as_str()).collect();
    debug!("模型输入: {:?}", input_names);
    for required in ["input_ids", "attention_mask", "pixel_values"] {
      if !input_names.contains(&required) {
        return Err(DetectionError::ModelLoad(format!(
          "模型缺少输入 {}: {}",
          required,
          files.model.display()
        )));
      }
    }

    let tokenizer = load_tokenizer(&files.tokenizer)?;

    let image_guided = match &files.image_guided {
      Some(path) => {
        info!("加载图像引导模型: {}", path.display());
        Some(Mutex::new(self.create_session(path)?))
      }
      None => {
        warn!("未找到图像引导模型，图像引导检测不可用");
        None
      }
    };

    info!("模型加载完成");
    Ok(OwlVit {
      variant: self.variant,
      session: Mutex::new(session),
      image_guided,
      tokenizer,
    })
  }

  fn resolve_files(&self) -> Result<ModelFiles, DetectionError> {
    let mut files = match &self.model_dir {
      Some(dir) => local_files(dir)?,
      None => self.hub_files()?,
    };

    if let Some(path) = &self.image_guided {
      if !path.exists() {
        return Err(DetectionError::ModelLoad(format!(
          "图像引导模型不存在: {}",
          path.display()
        )));
      }
      files.image_guided = Some(path.clone());
    }

    Ok(files)
  }

  fn hub_files(&self) -> Result<ModelFiles, DetectionError> {
    let api = match &self.cache_dir {
      Some(dir) => {
        debug!("模型缓存目录: {}", dir.display());
        ApiBuilder::new().with_cache_dir(dir.clone()).build()
      }
      None => Api::new(),
    }
    .map_err(load_error)?;

    let repo = api.model(self.variant.onnx_repo().to_string());
    info!("获取模型文件: {}", self.variant.onnx_repo());
    let model = repo.get(HUB_MODEL_FILE).map_err(load_error)?;
    let tokenizer = repo.get(TOKENIZER_FILE).map_err(load_error)?;

    Ok(ModelFiles {
      model,
      tokenizer,
      image_guided: None,
    })
  }

  fn create_session(&self, path: &Path) -> Result<Session, DetectionError> {
    debug!("创建 ONNX 推理会话: {}", path.display());
    Session::builder()
      .map_err(load_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(load_error)?
      .with_intra_threads(self.intra_threads)
      .map_err(load_error)?
      .commit_from_file(path)
      .map_err(|e| DetectionError::ModelLoad(format!("{}: {}", path.display(), e)))
  }
}

fn local_files(dir: &Path) -> Result<ModelFiles, DetectionError> {
  let model = [dir.join(MODEL_FILE), dir.join(HUB_MODEL_FILE)]
    .into_iter()
    .find(|path| path.exists())
    .ok_or_else(|| {
      DetectionError::ModelLoad(format!("模型目录中没有 {}: {}", MODEL_FILE, dir.display()))
    })?;

  let tokenizer = dir.join(TOKENIZER_FILE);
  if !tokenizer.exists() {
    return Err(DetectionError::ModelLoad(format!(
      "模型目录中没有 {}: {}",
      TOKENIZER_FILE,
      dir.display()
    )));
  }

  let image_guided = Some(dir.join(IMAGE_GUIDED_FILE)).filter(|path| path.exists());

  Ok(ModelFiles {
    model,
    tokenizer,
    image_guided,
  })
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer, DetectionError> {
  let mut tokenizer = Tokenizer::from_file(path).map_err(load_error)?;
  let pad_id = tokenizer.token_to_id(PAD_TOKEN).unwrap_or(0);

  tokenizer.with_padding(Some(PaddingParams {
    strategy: PaddingStrategy::Fixed(TEXT_MAX_LENGTH),
    pad_id,
    pad_token: PAD_TOKEN.to_string(),
    ..Default::default()
  }));
  tokenizer
    .with_truncation(Some(TruncationParams {
      max_length: TEXT_MAX_LENGTH,
      ..Default::default()
    }))
    .map_err(load_error)?;

  Ok(tokenizer)
}

/// OWL-ViT 检测模型
///
/// 会话放在 Mutex 中，失败的请求不会影响之后的调用。
pub struct OwlVit {
  variant: ModelVariant,
  session: Mutex<Session>,
  image_guided: Option<Mutex<Session>>,
  tokenizer: Tokenizer,
}

impl std::fmt::Debug for OwlVit {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OwlVit")
      .field("variant", &self.variant)
      .field("image_guided", &self.image_guided.is_some())
      .finish_non_exhaustive()
  }
}

impl OwlVit {
  pub fn variant(&self) -> ModelVariant {
    self.variant
  }

  fn pixel_values(&self, frame: &Frame) -> Result<Array4<f32>, DetectionError> {
    let side = self.variant.input_size() as usize;
    let data = frame.to_normalized_nchw(self.variant.input_size(), CLIP_MEAN, CLIP_STD);
    Array4::from_shape_vec((1, 3, side, side), data).map_err(inference_error)
  }

  fn tokenize(&self, queries: &[TextQuery]) -> Result<(Array2<i64>, Array2<i64>), DetectionError> {
    let prompts: Vec<&str> = queries.iter().map(TextQuery::prompt).collect();
    debug!("文本提示: {:?}", prompts);

    let encodings = self
      .tokenizer
      .encode_batch(prompts, true)
      .map_err(inference_error)?;

    let mut input_ids = Array2::<i64>::zeros((encodings.len(), TEXT_MAX_LENGTH));
    let mut attention_mask = Array2::<i64>::zeros((encodings.len(), TEXT_MAX_LENGTH));
    for (row, encoding) in encodings.iter().enumerate() {
      let ids = encoding.get_ids();
      let mask = encoding.get_attention_mask();
      for col in 0..TEXT_MAX_LENGTH.min(ids.len()) {
        input_ids[[row, col]] = ids[col] as i64;
        attention_mask[[row, col]] = mask[col] as i64;
      }
    }

    Ok((input_ids, attention_mask))
  }

  fn infer_text(
    &self,
    frame: &Frame,
    queries: &[TextQuery],
  ) -> Result<Vec<RawPrediction>, DetectionError> {
    let (input_ids, attention_mask) = self.tokenize(queries)?;
    let pixel_values = self.pixel_values(frame)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| DetectionError::Inference("推理会话不可用".to_string()))?;

    debug!("执行文本引导推理");
    let outputs = session
      .run(ort::inputs![
        "input_ids" => Value::from_array(input_ids).map_err(inference_error)?,
        "attention_mask" => Value::from_array(attention_mask).map_err(inference_error)?,
        "pixel_values" => Value::from_array(pixel_values).map_err(inference_error)?
      ])
      .map_err(inference_error)?;

    let logits = outputs["logits"]
      .try_extract_array::<f32>()
      .map_err(inference_error)?;
    let boxes = outputs["pred_boxes"]
      .try_extract_array::<f32>()
      .map_err(inference_error)?;

    decode_outputs(logits, boxes, self.variant.num_patches(), queries.len(), true)
  }

  fn infer_image(
    &self,
    frame: &Frame,
    reference: &Frame,
  ) -> Result<Vec<RawPrediction>, DetectionError> {
    let session = self.image_guided.as_ref().ok_or_else(|| {
      DetectionError::ModelUnavailable(format!("未配置图像引导模型 {}", IMAGE_GUIDED_FILE))
    })?;

    let pixel_values = self.pixel_values(frame)?;
    let query_pixel_values = self.pixel_values(reference)?;

    let mut session = session
      .lock()
      .map_err(|_| DetectionError::Inference("推理会话不可用".to_string()))?;

    debug!("执行图像引导推理");
    let outputs = session
      .run(ort::inputs![
        "pixel_values" => Value::from_array(pixel_values).map_err(inference_error)?,
        "query_pixel_values" => Value::from_array(query_pixel_values).map_err(inference_error)?
      ])
      .map_err(inference_error)?;

    let logits = outputs["logits"]
      .try_extract_array::<f32>()
      .map_err(inference_error)?;
    let boxes = outputs["target_pred_boxes"]
      .try_extract_array::<f32>()
      .map_err(inference_error)?;

    decode_outputs(logits, boxes, self.variant.num_patches(), 1, false)
  }
}

/// logits: [1, patches, queries]，boxes: [1, patches, 4]，patches 由模型输入边长与 patch 大小决定
fn decode_outputs(
  logits: ArrayViewD<'_, f32>,
  boxes: ArrayViewD<'_, f32>,
  num_patches: usize,
  num_queries: usize,
  with_query_index: bool,
) -> Result<Vec<RawPrediction>, DetectionError> {
  let malformed = |what: &str, shape: &[usize]| {
    DetectionError::MalformedOutput(format!("{} 形状不符: {:?}", what, shape))
  };

  let logits_shape = logits.shape().to_vec();
  let boxes_shape = boxes.shape().to_vec();
  let logits = logits
    .into_dimensionality::<Ix3>()
    .map_err(|_| malformed("logits", &logits_shape))?;
  let boxes = boxes
    .into_dimensionality::<Ix3>()
    .map_err(|_| malformed("boxes", &boxes_shape))?;

  let (_, patches, queries) = logits.dim();
  if logits.dim().0 != 1 || patches != num_patches || queries != num_queries {
    return Err(malformed("logits", &logits_shape));
  }
  if boxes.dim() != (1, patches, 4) {
    return Err(malformed("boxes", &boxes_shape));
  }
  debug!("模型输出: {} 个区域 x {} 个查询", patches, queries);

  let mut predictions = Vec::with_capacity(patches * queries);
  for p in 0..patches {
    let bbox = [
      boxes[[0, p, 0]],
      boxes[[0, p, 1]],
      boxes[[0, p, 2]],
      boxes[[0, p, 3]],
    ];
    for q in 0..queries {
      predictions.push(RawPrediction {
        bbox,
        score: sigmoid(logits[[0, p, q]]),
        query_index: with_query_index.then_some(q),
      });
    }
  }

  Ok(predictions)
}

impl Model for OwlVit {
  fn infer(&self, frame: &Frame, query: &Query) -> Result<Vec<RawPrediction>, DetectionError> {
    match query {
      Query::Text(queries) => self.infer_text(frame, queries),
      Query::Image(reference) => self.infer_image(frame, reference),
    }
  }
}
