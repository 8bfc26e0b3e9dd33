// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::model::DetectItem;

/// 计算两个 [x_min, y_min, x_max, y_max] 边界框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别做贪心 NMS
///
/// 先按置信度降序排序（稳定排序，分数相同保持原顺序），每次保留剩余中分数最高的框，
/// 并删除同一标签下与其 IoU 大于 `overlap` 的框。结果按置信度降序排列。
pub fn non_max_suppression<T: PartialEq>(
  mut items: Vec<DetectItem<T>>,
  overlap: f32,
) -> Vec<DetectItem<T>> {
  items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept: Vec<DetectItem<T>> = Vec::with_capacity(items.len());
  for candidate in items {
    let suppressed = kept
      .iter()
      .any(|best| best.kind == candidate.kind && iou(&best.bbox, &candidate.bbox) > overlap);
    if !suppressed {
      kept.push(candidate);
    }
  }

  kept
}
