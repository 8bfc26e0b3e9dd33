// 该文件是 Xunwu （寻物） 项目的一部分。
// src/input/fetch_url.rs - HTTP(S) 图像下载
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

use std::{io::Read, time::Duration};

use reqwest::blocking::Client;
use tracing::{debug, error};
use url::Url;

use crate::input::LoadError;

/// 整体下载，不重试；分块传输的响应读到上限即停止
pub struct UrlFetcher {
  timeout: Duration,
  max_bytes: usize,
}

impl UrlFetcher {
  pub fn new(timeout: Duration, max_bytes: usize) -> Self {
    Self { timeout, max_bytes }
  }

  pub fn fetch(&self, url: &Url) -> Result<Vec<u8>, LoadError> {
    let unreachable = |e: reqwest::Error| {
      error!("下载失败 {}: {}", url, e);
      LoadError::Unreachable {
        url: url.to_string(),
        reason: e.to_string(),
      }
    };

    let client = Client::builder()
      .timeout(self.timeout)
      .build()
      .map_err(unreachable)?;

    debug!("GET {}", url);
    let response = client.get(url.as_str()).send().map_err(unreachable)?;

    let status = response.status();
    if !status.is_success() {
      error!("下载失败 {}: HTTP {}", url, status);
      return Err(LoadError::Http {
        url: url.to_string(),
        status: status.as_u16(),
      });
    }

    if let Some(length) = response.content_length()
      && length > self.max_bytes as u64
    {
      return Err(LoadError::TooLarge(length));
    }

    // 多读一个字节用于判断是否超限
    let mut body = Vec::new();
    response
      .take(self.max_bytes as u64 + 1)
      .read_to_end(&mut body)
      .map_err(|e| {
        error!("下载失败 {}: {}", url, e);
        LoadError::Unreachable {
          url: url.to_string(),
          reason: e.to_string(),
        }
      })?;
    if body.len() > self.max_bytes {
      return Err(LoadError::TooLarge(body.len() as u64));
    }

    Ok(body)
  }
}
