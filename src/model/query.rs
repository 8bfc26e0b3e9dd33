// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/query.rs - 检测查询
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

use tracing::{debug, warn};

use crate::{
  frame::Frame,
  model::{
    ValidationError,
    translate::{self, Translator},
  },
};

pub const MAX_TEXT_QUERIES: usize = 5;
pub const MAX_QUERY_CHARS: usize = 50;
const MIN_ASCII_QUERY_CHARS: usize = 2;
const PROMPT_PREFIX: &str = "a photo of a ";

/// 一条文本查询：用户原文与实际送入模型的提示词
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
  original: String,
  english: Option<String>,
  prompt: String,
}

impl TextQuery {
  /// 只用内置词典翻译
  pub fn new(text: &str) -> Result<Self, ValidationError> {
    Self::with_translator(text, &Translator::dictionary())
  }

  pub fn with_translator(text: &str, translator: &Translator) -> Result<Self, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      return Err(ValidationError::BlankQuery);
    }

    // 单个汉字也是完整的词，只对纯 ASCII 查询限制最短长度
    if trimmed.is_ascii() && trimmed.chars().count() < MIN_ASCII_QUERY_CHARS {
      return Err(ValidationError::QueryTooShort(trimmed.to_string()));
    }

    let original: String = if trimmed.chars().count() > MAX_QUERY_CHARS {
      let truncated: String = trimmed.chars().take(MAX_QUERY_CHARS).collect();
      warn!("查询过长，截断为前 {} 个字符: {}", MAX_QUERY_CHARS, truncated);
      truncated
    } else {
      trimmed.to_string()
    };

    let english = if translate::needs_translation(&original) {
      let english = translator.translate(&original);
      match &english {
        Some(english) => debug!("翻译查询: {} -> {}", original, english),
        None => warn!("无法翻译查询，按原文使用: {}", original),
      }
      english
    } else {
      None
    };

    let prompt = format!(
      "{}{}",
      PROMPT_PREFIX,
      english.as_deref().unwrap_or(&original)
    );

    Ok(Self {
      original,
      english,
      prompt,
    })
  }

  pub fn original(&self) -> &str {
    &self.original
  }

  pub fn prompt(&self) -> &str {
    &self.prompt
  }

  /// 展示用标签，翻译过的附带英文
  pub fn label(&self) -> String {
    match &self.english {
      Some(english) => format!("{}({})", self.original, english),
      None => self.original.clone(),
    }
  }
}

/// 文本引导与图像引导两种模式，互斥
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
  Text(Vec<TextQuery>),
  Image(Frame),
}

impl Query {
  /// 校验并格式化文本查询，最多保留前 MAX_TEXT_QUERIES 条
  pub fn text<I, S>(queries: I) -> Result<Self, ValidationError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self::text_with(queries, &Translator::dictionary())
  }

  /// 提示词相同的查询只保留第一条
  pub fn text_with<I, S>(queries: I, translator: &Translator) -> Result<Self, ValidationError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let all = queries
      .into_iter()
      .map(|query| TextQuery::with_translator(query.as_ref(), translator))
      .collect::<Result<Vec<_>, _>>()?;

    if all.is_empty() {
      return Err(ValidationError::EmptyQuery);
    }

    let mut parsed: Vec<TextQuery> = Vec::with_capacity(all.len());
    for query in all {
      let duplicate_of = parsed
        .iter()
        .find(|kept| kept.prompt() == query.prompt())
        .map(TextQuery::label);
      match duplicate_of {
        Some(kept) => warn!("忽略重复查询: {} (与 {} 相同)", query.label(), kept),
        None => parsed.push(query),
      }
    }

    if parsed.len() > MAX_TEXT_QUERIES {
      warn!(
        "查询数量过多 ({})，仅保留前 {} 条",
        parsed.len(),
        MAX_TEXT_QUERIES
      );
      parsed.truncate(MAX_TEXT_QUERIES);
    }

    Ok(Query::Text(parsed))
  }

  pub fn image(frame: Frame) -> Result<Self, ValidationError> {
    let query = Query::Image(frame);
    query.validate()?;
    Ok(query)
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    match self {
      Query::Text(queries) if queries.is_empty() => Err(ValidationError::EmptyQuery),
      Query::Text(_) => Ok(()),
      Query::Image(frame) if frame.is_empty() => Err(ValidationError::EmptyQueryImage),
      Query::Image(_) => Ok(()),
    }
  }

  /// 文本查询的条数，图像查询为 0
  pub fn text_len(&self) -> usize {
    match self {
      Query::Text(queries) => queries.len(),
      Query::Image(_) => 0,
    }
  }
}
