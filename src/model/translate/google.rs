// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/translate/google.rs - Google 翻译在线接口
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

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::model::translate::{TranslateApi, TranslateError};

const ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// 日文到英文，免密钥的 gtx 客户端
pub struct GoogleTranslateApi {
  client: Client,
}

impl GoogleTranslateApi {
  pub fn new(timeout: Duration) -> Result<Self, TranslateError> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| TranslateError::Request(e.to_string()))?;
    Ok(Self { client })
  }
}

/// 译文位于 `[[["译文", "原文", ...], ...], ...]` 的第一个位置
fn parse_response(body: &Value) -> Result<String, TranslateError> {
  body
    .get(0)
    .and_then(|sentences| sentences.get(0))
    .and_then(|sentence| sentence.get(0))
    .and_then(Value::as_str)
    .map(|text| text.trim().to_string())
    .ok_or_else(|| TranslateError::Response(body.to_string()))
}

impl TranslateApi for GoogleTranslateApi {
  fn translate(&self, text: &str) -> Result<String, TranslateError> {
    debug!("请求在线翻译: {}", text);
    let response = self
      .client
      .get(ENDPOINT)
      .query(&[
        ("client", "gtx"),
        ("sl", "ja"),
        ("tl", "en"),
        ("dt", "t"),
        ("q", text),
      ])
      .send()
      .map_err(|e| TranslateError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(TranslateError::Request(format!("HTTP {}", status)));
    }

    let body = response
      .text()
      .map_err(|e| TranslateError::Request(e.to_string()))?;
    let body: Value =
      serde_json::from_str(&body).map_err(|e| TranslateError::Response(e.to_string()))?;
    parse_response(&body)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn takes_the_first_translated_segment() {
    let body = json!([[["space ", "宇宙", null, null, 10]], null, "ja"]);
    assert_eq!(parse_response(&body).unwrap(), "space");
  }

  #[test]
  fn unexpected_bodies_are_errors() {
    assert!(matches!(
      parse_response(&json!({"error": "quota"})),
      Err(TranslateError::Response(_))
    ));
    assert!(matches!(
      parse_response(&json!([[[42]]])),
      Err(TranslateError::Response(_))
    ));
  }
}
