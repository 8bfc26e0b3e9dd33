// 该文件是 Xunwu （寻物） 项目的一部分。
// src/input/sample.rs - 内置示例图像
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

use std::str::FromStr;

use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::LoadError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
  Office,
  Kitchen,
  LivingRoom,
  Street,
  Nature,
  Cats,
}

impl Sample {
  pub const ALL: [Sample; 6] = [
    Sample::Office,
    Sample::Kitchen,
    Sample::LivingRoom,
    Sample::Street,
    Sample::Nature,
    Sample::Cats,
  ];

  pub fn name(&self) -> &'static str {
    match self {
      Sample::Office => "office",
      Sample::Kitchen => "kitchen",
      Sample::LivingRoom => "living-room",
      Sample::Street => "street",
      Sample::Nature => "nature",
      Sample::Cats => "cats",
    }
  }

  fn address(&self) -> &'static str {
    match self {
      Sample::Office => {
        "https://images.unsplash.com/photo-1497366216548-37526070297c?w=800&h=600&fit=crop"
      }
      Sample::Kitchen => {
        "https://images.unsplash.com/photo-1556909114-f6e7ad7d3136?w=800&h=600&fit=crop"
      }
      Sample::LivingRoom => {
        "https://images.unsplash.com/photo-1586023492125-27b2c045efd7?w=800&h=600&fit=crop"
      }
      Sample::Street => {
        "https://images.unsplash.com/photo-1449824913935-59a10b8d2000?w=800&h=600&fit=crop"
      }
      Sample::Nature => {
        "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=800&h=600&fit=crop"
      }
      Sample::Cats => "http://images.cocodataset.org/val2017/000000039769.jpg",
    }
  }

  pub fn url(&self) -> Url {
    Url::parse(self.address()).expect("示例地址为常量")
  }
}

impl FromStr for Sample {
  type Err = LoadError;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    Sample::ALL
      .iter()
      .copied()
      .find(|sample| sample.name() == name)
      .ok_or_else(|| LoadError::UnknownSample(name.to_string()))
  }
}

impl FromUrlWithScheme for Sample {
  const SCHEME: &'static str = "sample";
}

impl FromUrl for Sample {
  type Error = LoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LoadError::SchemeMismatch(url.scheme().to_string()));
    }

    // sample:street 与 sample://street 均可
    let name = match url.host_str() {
      Some(host) if !host.is_empty() => host,
      _ => url.path().trim_start_matches('/'),
    };
    name.parse()
  }
}
