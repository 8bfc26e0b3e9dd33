// 该文件是 Xunwu （寻物） 项目的一部分。
// src/task.rs - 单次检测任务
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

use thiserror::Error;
use tracing::{error, info};

use crate::{
  frame::Frame,
  input::{ImageSource, Intake, LoadError},
  model::{
    DetectResult, DetectionError, Detector, Label, Model, ModelError, Query, Settings, Translator,
    ValidationError,
  },
  output::{Render, RenderError},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 请求失败的原因，按阶段区分
#[derive(Error, Debug)]
pub enum RequestError {
  #[error("图像加载失败: {0}")]
  Load(#[from] LoadError),
  #[error("输入校验失败: {0}")]
  Validation(#[from] ValidationError),
  #[error("检测失败: {0}")]
  Detection(#[from] DetectionError),
  #[error("渲染失败: {0}")]
  Render(#[from] RenderError),
}

impl From<ModelError> for RequestError {
  fn from(e: ModelError) -> Self {
    match e {
      ModelError::Validation(e) => RequestError::Validation(e),
      ModelError::Detection(e) => RequestError::Detection(e),
    }
  }
}

/// 查询输入，图像查询在任务中加载
#[derive(Debug, Clone)]
pub enum QueryInput {
  Text(Vec<String>),
  Image(ImageSource),
}

#[derive(Debug)]
enum PreparedQuery {
  Ready(Query),
  Reference(ImageSource),
}

#[derive(Debug, Clone)]
pub struct Request {
  pub source: ImageSource,
  pub query: QueryInput,
}

/// 已通过阈值与文本校验的请求，尚未加载任何图像
#[derive(Debug)]
pub struct PreparedRequest {
  source: ImageSource,
  query: PreparedQuery,
}

/// 一次请求的完整结果
#[derive(Debug)]
pub struct Completed<R> {
  pub result: DetectResult<Label>,
  pub output: R,
}

#[derive(Debug, Default)]
pub struct OneShotTask {
  intake: Intake,
  settings: Settings,
  translator: Translator,
}

impl OneShotTask {
  pub fn new(intake: Intake, settings: Settings) -> Self {
    Self {
      intake,
      settings,
      translator: Translator::dictionary(),
    }
  }

  pub fn with_translator(mut self, translator: Translator) -> Self {
    self.translator = translator;
    self
  }

  /// 校验阈值与文本查询，无效请求不做任何加载
  pub fn prepare(&self, request: Request) -> Result<PreparedRequest, RequestError> {
    self.settings.validate()?;
    let query = match request.query {
      QueryInput::Text(queries) => {
        PreparedQuery::Ready(Query::text_with(&queries, &self.translator)?)
      }
      QueryInput::Image(reference) => PreparedQuery::Reference(reference),
    };
    Ok(PreparedRequest {
      source: request.source,
      query,
    })
  }

  fn load(&self, source: &ImageSource) -> Result<Frame, LoadError> {
    let now = Instant::now();
    let frame = self.intake.load(source)?;
    info!(
      "图像加载完成: {}x{}，耗时: {:.2?}",
      frame.width(),
      frame.height(),
      now.elapsed()
    );
    Ok(frame)
  }

  fn run<M, O>(
    self,
    request: PreparedRequest,
    model: M,
    output: O,
  ) -> Result<Completed<O::Output>, RequestError>
  where
    M: Model,
    O: Render<Frame, DetectResult<Label>, Error = RenderError>,
  {
    let frame = self.load(&request.source)?;
    let query = match request.query {
      PreparedQuery::Ready(query) => query,
      PreparedQuery::Reference(reference) => Query::image(self.load(&reference)?)?,
    };

    let detector = Detector::new(model);
    let result = detector.detect(&frame, &query, &self.settings)?;

    let now = Instant::now();
    let output = output.render_result(&frame, &result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(Completed { result, output })
  }
}

impl<M, O> Task<Request, M, O> for OneShotTask
where
  M: Model,
  O: Render<Frame, DetectResult<Label>, Error = RenderError>,
{
  type Output = Completed<O::Output>;
  type Error = RequestError;

  fn run_task(self, request: Request, model: M, output: O) -> Result<Self::Output, Self::Error> {
    let prepared = self
      .prepare(request)
      .inspect_err(|e| error!("任务失败: {}", e))?;
    Task::<PreparedRequest, M, O>::run_task(self, prepared, model, output)
  }
}

impl<M, O> Task<PreparedRequest, M, O> for OneShotTask
where
  M: Model,
  O: Render<Frame, DetectResult<Label>, Error = RenderError>,
{
  type Output = Completed<O::Output>;
  type Error = RequestError;

  fn run_task(
    self,
    request: PreparedRequest,
    model: M,
    output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let now = Instant::now();
    let completed = self
      .run(request, model, output)
      .inspect_err(|e| error!("任务失败: {}", e))?;
    info!(
      "任务完成: {} 个检测结果，总耗时: {:.2?}",
      completed.result.len(),
      now.elapsed()
    );
    Ok(completed)
  }
}

#[cfg(test)]
mod tests {
  use url::Url;

  use super::*;

  fn never_fetched() -> ImageSource {
    ImageSource::Url(Url::parse("http://127.0.0.1:9/never-fetched.png").unwrap())
  }

  #[test]
  fn prepare_rejects_bad_thresholds() {
    let task = OneShotTask::new(Intake::default(), Settings::new(0.1, -0.2));
    let request = Request {
      source: never_fetched(),
      query: QueryInput::Text(vec!["car".to_string()]),
    };
    assert!(matches!(
      task.prepare(request),
      Err(RequestError::Validation(
        ValidationError::ThresholdOutOfRange { name: "overlap", .. }
      ))
    ));
  }

  #[test]
  fn prepare_rejects_empty_and_short_queries() {
    let task = OneShotTask::default();
    for queries in [vec![], vec!["a".to_string()]] {
      let request = Request {
        source: never_fetched(),
        query: QueryInput::Text(queries),
      };
      assert!(matches!(
        task.prepare(request),
        Err(RequestError::Validation(_))
      ));
    }
  }

  #[test]
  fn prepare_keeps_the_source_unloaded() {
    let task = OneShotTask::default();
    let request = Request {
      source: never_fetched(),
      query: QueryInput::Text(vec!["car".to_string(), "car".to_string()]),
    };
    let prepared = task.prepare(request).unwrap();
    assert!(matches!(prepared.source, ImageSource::Url(_)));
    assert!(matches!(
      prepared.query,
      PreparedQuery::Ready(Query::Text(ref queries)) if queries.len() == 1
    ));
  }
}
