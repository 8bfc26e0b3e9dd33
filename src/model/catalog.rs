// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/catalog.rs - 可用模型列表
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

use crate::model::DetectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
  #[default]
  BasePatch32,
  BasePatch16,
  LargePatch14,
}

impl ModelVariant {
  pub const ALL: [ModelVariant; 3] = [
    ModelVariant::BasePatch32,
    ModelVariant::BasePatch16,
    ModelVariant::LargePatch14,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      ModelVariant::BasePatch32 => "google/owlvit-base-patch32",
      ModelVariant::BasePatch16 => "google/owlvit-base-patch16",
      ModelVariant::LargePatch14 => "google/owlvit-large-patch14",
    }
  }

  /// 托管 ONNX 导出文件的仓库
  pub fn onnx_repo(&self) -> &'static str {
    match self {
      ModelVariant::BasePatch32 => "Xenova/owlvit-base-patch32",
      ModelVariant::BasePatch16 => "Xenova/owlvit-base-patch16",
      ModelVariant::LargePatch14 => "Xenova/owlvit-large-patch14",
    }
  }

  /// 模型输入边长
  pub fn input_size(&self) -> u32 {
    match self {
      ModelVariant::BasePatch32 | ModelVariant::BasePatch16 => 768,
      ModelVariant::LargePatch14 => 840,
    }
  }

  pub fn patch_size(&self) -> u32 {
    match self {
      ModelVariant::BasePatch32 => 32,
      ModelVariant::BasePatch16 => 16,
      ModelVariant::LargePatch14 => 14,
    }
  }

  /// 每张图像输出的候选框数量
  pub fn num_patches(&self) -> usize {
    let side = (self.input_size() / self.patch_size()) as usize;
    side * side
  }
}

impl fmt::Display for ModelVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for ModelVariant {
  type Err = DetectionError;

  /// 接受完整名称，也接受去掉 `google/owlvit-` 前缀的简写
  fn from_str(name: &str) -> Result<Self, Self::Err> {
    ModelVariant::ALL
      .iter()
      .copied()
      .find(|variant| {
        variant.name() == name || variant.name().trim_start_matches("google/owlvit-") == name
      })
      .ok_or_else(|| DetectionError::UnknownModel(name.to_string()))
  }
}
