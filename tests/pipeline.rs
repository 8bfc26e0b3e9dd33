// 该文件是 Xunwu （寻物） 项目的一部分。
// tests/pipeline.rs - 完整检测流程测试
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

use std::{cell::Cell, io::Cursor};

use image::{ImageFormat, Rgb, RgbImage};
use url::Url;

use xunwu::{
  frame::Frame,
  input::{ImageSource, Intake, LoadError},
  model::{
    DetectResult, DetectionError, Detector, Label, Model, ModelError, Query, RawPrediction,
    Settings, ValidationError, WithLabel, nms::iou,
  },
  output::{Draw, Rendered, Renderer},
  task::{Completed, OneShotTask, QueryInput, Request, RequestError, Task},
};

const BACKGROUND: Rgb<u8> = Rgb([128, 128, 128]);

/// 固定输出的检测器，记录调用次数
#[derive(Default)]
struct StubModel {
  calls: Cell<usize>,
}

impl StubModel {
  fn candidates(query_index: Option<usize>) -> Vec<RawPrediction> {
    let offset = query_index.unwrap_or(0) as f32 * 0.1;
    [
      ([0.25, 0.5, 0.3, 0.4], 0.85 - offset),
      ([0.27, 0.5, 0.3, 0.4], 0.6 - offset),
      ([0.75, 0.5, 0.2, 0.3], 0.35),
      ([0.5, 0.15, 0.1, 0.1], 0.05),
    ]
    .into_iter()
    .map(|(bbox, score)| RawPrediction {
      bbox,
      score,
      query_index,
    })
    .collect()
  }
}

impl Model for StubModel {
  fn infer(&self, _frame: &Frame, query: &Query) -> Result<Vec<RawPrediction>, DetectionError> {
    self.calls.set(self.calls.get() + 1);
    match query {
      Query::Text(queries) => Ok((0..queries.len()).flat_map(|q| Self::candidates(Some(q))).collect()),
      Query::Image(_) => Ok(Self::candidates(None)),
    }
  }
}

fn png_upload(width: u32, height: u32) -> ImageSource {
  let image = RgbImage::from_pixel(width, height, BACKGROUND);
  let mut bytes = Vec::new();
  image
    .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
    .unwrap();
  ImageSource::Upload(bytes)
}

fn text_request(queries: &[&str]) -> Request {
  Request {
    source: png_upload(200, 160),
    query: QueryInput::Text(queries.iter().map(|q| q.to_string()).collect()),
  }
}

fn run(
  request: Request,
  model: &StubModel,
  confidence: f32,
  overlap: f32,
) -> Result<Completed<Rendered>, RequestError> {
  OneShotTask::new(Intake::default(), Settings::new(confidence, overlap)).run_task(
    request,
    model,
    Renderer::new(Draw::without_font()),
  )
}

fn boxes(result: &DetectResult<Label>) -> Vec<(String, [f32; 4])> {
  result
    .iter()
    .map(|item| (item.kind.to_label_str(), item.bbox))
    .collect()
}

#[test]
fn finds_a_car_and_draws_every_box() {
  let model = StubModel::default();
  let completed = run(text_request(&["car"]), &model, 0.1, 0.3).unwrap();
  let result = &completed.result;

  assert!(!result.is_empty());
  let draw = Draw::without_font();
  let image = &completed.output.image;
  for item in result.iter() {
    assert_eq!(item.kind.to_label_str(), "car");
    assert!(item.score >= 0.1);

    // 每个检测框的下边缘都已绘制
    let x = ((item.bbox[0] + item.bbox[2]) / 2.0) as u32;
    let y = (item.bbox[3].ceil() as u32).min(image.height() - 1);
    assert_eq!(*image.get_pixel(x, y), draw.color_for(&item.kind));
  }
  assert_eq!(completed.output.table.len(), result.len());
}

#[test]
fn higher_confidence_never_adds_detections() {
  let model = StubModel::default();
  let low = run(text_request(&["car"]), &model, 0.1, 0.3).unwrap();
  let high = run(text_request(&["car"]), &model, 0.9, 0.3).unwrap();
  assert!(high.result.len() <= low.result.len());
}

#[test]
fn filtering_is_monotonic_in_confidence() {
  let model = StubModel::default();
  let thresholds = [0.0, 0.04, 0.1, 0.3, 0.5, 0.7, 0.8, 1.0];

  for pair in thresholds.windows(2) {
    let loose = run(text_request(&["car", "dog"]), &model, pair[0], 0.3).unwrap();
    let strict = run(text_request(&["car", "dog"]), &model, pair[1], 0.3).unwrap();

    let loose = boxes(&loose.result);
    for detection in boxes(&strict.result) {
      assert!(loose.contains(&detection), "{:?} 在 {} 时缺失", detection, pair[0]);
    }
  }
}

#[test]
fn kept_boxes_of_one_label_do_not_overlap() {
  let model = StubModel::default();
  for overlap in [0.0, 0.3, 0.6, 0.9] {
    let completed = run(text_request(&["car", "dog", "cup"]), &model, 0.0, overlap).unwrap();
    let items: Vec<_> = completed.result.iter().collect();
    for (i, a) in items.iter().enumerate() {
      for b in items.iter().skip(i + 1) {
        if a.kind == b.kind {
          assert!(iou(&a.bbox, &b.bbox) <= overlap);
        }
      }
    }
  }
}

#[test]
fn overlapping_duplicates_are_suppressed() {
  let model = StubModel::default();
  let completed = run(text_request(&["car"]), &model, 0.1, 0.3).unwrap();
  let scores: Vec<f32> = completed.result.iter().map(|item| item.score).collect();
  assert_eq!(scores, vec![0.85, 0.35]);
}

#[test]
fn repeated_query_text_is_detected_once() {
  let model = StubModel::default();
  let completed = run(text_request(&["car", "car"]), &model, 0.1, 0.3).unwrap();
  let scores: Vec<f32> = completed.result.iter().map(|item| item.score).collect();
  assert_eq!(scores, vec![0.85, 0.35]);

  let items: Vec<_> = completed.result.iter().collect();
  for (i, a) in items.iter().enumerate() {
    for b in items.iter().skip(i + 1) {
      if a.kind.to_label_str() == b.kind.to_label_str() {
        assert!(iou(&a.bbox, &b.bbox) <= 0.3);
      }
    }
  }
}

#[test]
fn results_are_sorted_by_score() {
  let model = StubModel::default();
  let completed = run(text_request(&["car", "dog"]), &model, 0.0, 1.0).unwrap();
  let scores: Vec<f32> = completed.result.iter().map(|item| item.score).collect();
  assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn repeated_requests_are_identical() {
  let model = StubModel::default();
  let a = run(text_request(&["car", "猫"]), &model, 0.1, 0.3).unwrap();
  let b = run(text_request(&["car", "猫"]), &model, 0.1, 0.3).unwrap();
  assert_eq!(a.result, b.result);
  assert_eq!(a.output.png, b.output.png);
}

#[test]
fn translated_queries_keep_the_original_label() {
  let model = StubModel::default();
  let completed = run(text_request(&["猫"]), &model, 0.1, 0.3).unwrap();
  assert_eq!(completed.result.items[0].kind.to_label_str(), "猫(cat)");
}

#[test]
fn image_guided_results_are_labelled_similar() {
  let model = StubModel::default();
  let request = Request {
    source: png_upload(200, 160),
    query: QueryInput::Image(png_upload(120, 120)),
  };
  let completed = run(request, &model, 0.1, 0.3).unwrap();
  assert!(!completed.result.is_empty());
  assert!(completed.result.iter().all(|item| item.kind == Label::Similar));
}

#[test]
fn empty_query_list_skips_the_model() {
  let model = StubModel::default();
  let result = run(text_request(&[]), &model, 0.1, 0.3);
  assert!(matches!(
    result,
    Err(RequestError::Validation(ValidationError::EmptyQuery))
  ));
  assert_eq!(model.calls.get(), 0);
}

#[test]
fn empty_reference_image_skips_the_model() {
  let model = StubModel::default();
  let detector = Detector::new(&model);
  let frame = Frame::from(RgbImage::from_pixel(200, 160, BACKGROUND));
  let empty = Query::Image(Frame::from(RgbImage::new(0, 0)));

  let result = detector.detect(&frame, &empty, &Settings::default());
  assert!(matches!(
    result,
    Err(ModelError::Validation(ValidationError::EmptyQueryImage))
  ));
  assert_eq!(model.calls.get(), 0);
}

#[test]
fn invalid_threshold_is_rejected_before_loading() {
  let model = StubModel::default();
  let request = Request {
    source: ImageSource::Url(Url::parse("http://127.0.0.1:9/never-fetched.png").unwrap()),
    query: QueryInput::Text(vec!["car".to_string()]),
  };
  let result = run(request, &model, 1.5, 0.3);
  assert!(matches!(
    result,
    Err(RequestError::Validation(
      ValidationError::ThresholdOutOfRange { .. }
    ))
  ));
  assert_eq!(model.calls.get(), 0);
}

#[test]
fn unreachable_url_skips_the_model() {
  let model = StubModel::default();
  let request = Request {
    source: ImageSource::Url(Url::parse("http://127.0.0.1:9/missing.png").unwrap()),
    query: QueryInput::Text(vec!["car".to_string()]),
  };
  let result = run(request, &model, 0.1, 0.3);
  assert!(matches!(result, Err(RequestError::Load(_))));
  assert_eq!(model.calls.get(), 0);
}

#[test]
fn tiny_images_are_rejected() {
  let model = StubModel::default();
  let request = Request {
    source: png_upload(50, 50),
    query: QueryInput::Text(vec!["car".to_string()]),
  };
  let result = run(request, &model, 0.1, 0.3);
  assert!(matches!(
    result,
    Err(RequestError::Load(LoadError::TooSmall { .. }))
  ));
  assert_eq!(model.calls.get(), 0);
}

#[test]
fn large_images_are_downscaled_before_detection() {
  let model = StubModel::default();
  let request = Request {
    source: png_upload(1600, 1200),
    query: QueryInput::Text(vec!["car".to_string()]),
  };
  let completed = run(request, &model, 0.1, 0.3).unwrap();
  assert_eq!(completed.output.image.dimensions(), (800, 600));
  for item in completed.result.iter() {
    assert!(item.bbox[2] <= 800.0 && item.bbox[3] <= 600.0);
  }
}
