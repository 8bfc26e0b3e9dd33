// 该文件是 Xunwu （寻物） 项目的一部分。
// src/output/table.rs - 检测结果汇总表
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

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{
  model::{DetectResult, WithLabel},
  output::RenderError,
};

const CSV_HEADER: &str = "label,score,x_min,y_min,x_max,y_max";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
  pub label: String,
  pub score: f32,
  pub x_min: f32,
  pub y_min: f32,
  pub x_max: f32,
  pub y_max: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SummaryTable {
  rows: Vec<SummaryRow>,
}

fn csv_field(text: &str) -> String {
  if text.contains([',', '"', '\n', '\r']) {
    format!("\"{}\"", text.replace('"', "\"\""))
  } else {
    text.to_string()
  }
}

impl SummaryTable {
  pub fn from_result<T: WithLabel>(result: &DetectResult<T>) -> Self {
    let rows = result
      .iter()
      .map(|item| SummaryRow {
        label: item.kind.to_label_str(),
        score: item.score,
        x_min: item.bbox[0],
        y_min: item.bbox[1],
        x_max: item.bbox[2],
        y_max: item.bbox[3],
      })
      .collect();
    Self { rows }
  }

  pub fn rows(&self) -> &[SummaryRow] {
    &self.rows
  }

  pub fn len(&self) -> usize {
    self.rows.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }

  pub fn to_csv(&self) -> String {
    let mut lines = Vec::with_capacity(self.rows.len() + 1);
    lines.push(CSV_HEADER.to_string());
    for row in &self.rows {
      lines.push(format!(
        "{},{:.4},{:.1},{:.1},{:.1},{:.1}",
        csv_field(&row.label),
        row.score,
        row.x_min,
        row.y_min,
        row.x_max,
        row.y_max
      ));
    }
    lines.join("\n") + "\n"
  }

  pub fn to_json(&self) -> Result<String, RenderError> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  /// 按格式导出，`TableFormat::None` 返回 None
  pub fn export(&self, format: TableFormat) -> Result<Option<String>, RenderError> {
    match format {
      TableFormat::Csv => Ok(Some(self.to_csv())),
      TableFormat::Json => self.to_json().map(Some),
      TableFormat::None => Ok(None),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
  #[default]
  Csv,
  Json,
  None,
}

impl TableFormat {
  pub fn extension(&self) -> Option<&'static str> {
    match self {
      TableFormat::Csv => Some("csv"),
      TableFormat::Json => Some("json"),
      TableFormat::None => None,
    }
  }
}

impl fmt::Display for TableFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.extension().unwrap_or("none"))
  }
}

impl FromStr for TableFormat {
  type Err = RenderError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "csv" => Ok(TableFormat::Csv),
      "json" => Ok(TableFormat::Json),
      "none" => Ok(TableFormat::None),
      other => Err(RenderError::UnknownTableFormat(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{DetectItem, Label};

  fn table() -> SummaryTable {
    let result = DetectResult {
      items: vec![
        DetectItem {
          kind: Label::Query {
            index: 0,
            text: "猫(cat)".to_string(),
          },
          score: 0.87654,
          bbox: [1.0, 2.0, 30.5, 40.3],
        },
        DetectItem {
          kind: Label::Query {
            index: 1,
            text: "red, car".to_string(),
          },
          score: 0.2,
          bbox: [5.0, 6.0, 7.0, 8.0],
        },
      ]
      .into_boxed_slice(),
    };
    SummaryTable::from_result(&result)
  }

  #[test]
  fn csv_has_one_row_per_detection() {
    let csv = table().to_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    assert_eq!(lines[1], "猫(cat),0.8765,1.0,2.0,30.5,40.3");
    assert_eq!(lines[2], "\"red, car\",0.2000,5.0,6.0,7.0,8.0");
  }

  #[test]
  fn json_is_an_array_of_rows() {
    let json = table().to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["label"], "red, car");
    assert_eq!(rows[0]["x_max"], 30.5);
  }

  #[test]
  fn empty_result_gives_header_only() {
    let empty = SummaryTable::from_result(&DetectResult::<Label> {
      items: Box::new([]),
    });
    assert_eq!(empty.to_csv(), format!("{}\n", CSV_HEADER));
    assert_eq!(empty.export(TableFormat::None).unwrap(), None);
  }

  #[test]
  fn parses_formats() {
    assert_eq!("JSON".parse::<TableFormat>().unwrap(), TableFormat::Json);
    assert!("xml".parse::<TableFormat>().is_err());
  }
}
