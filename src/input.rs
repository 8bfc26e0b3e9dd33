// 该文件是 Xunwu （寻物） 项目的一部分。
// src/input.rs - 图像输入
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

use std::{borrow::Cow, path::PathBuf, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

mod normalize;
mod read_image_file;
mod sample;

#[cfg(feature = "fetch_url")]
mod fetch_url;

pub use self::normalize::{SUPPORTED_FORMATS, decode_image, fit_within, normalize};
pub use self::read_image_file::ImageFile;
pub use self::sample::Sample;

#[cfg(feature = "fetch_url")]
pub use self::fetch_url::UrlFetcher;

const DEFAULT_MAX_SIDE: u32 = 800;
const DEFAULT_MIN_SIDE: u32 = 100;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_BYTES: usize = 32 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum LoadError {
  #[error("URI 方案不受支持: {0}")]
  SchemeMismatch(String),
  #[error("无效的输入地址: {0}")]
  InvalidSource(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无法访问 {url}: {reason}")]
  Unreachable { url: String, reason: String },
  #[error("请求 {url} 失败，HTTP 状态码 {status}")]
  Http { url: String, status: u16 },
  #[error("图像数据过大: {0} 字节")]
  TooLarge(u64),
  #[error("不支持的图像格式: {0}")]
  UnsupportedFormat(String),
  #[error("图像解码错误: {0}")]
  Decode(image::ImageError),
  #[error("图像尺寸过小: {width}x{height}，最小为 {min}x{min}")]
  TooSmall { width: u32, height: u32, min: u32 },
  #[error("未知的示例图像: {0}")]
  UnknownSample(String),
  #[error("未启用 URL 下载功能")]
  FetchDisabled,
}

/// 图像来源
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
  /// http(s) 地址，整体下载
  Url(Url),
  /// 本地文件
  File(ImageFile),
  /// 内置示例
  Sample(Sample),
  /// 上传的原始字节
  Upload(Vec<u8>),
}

impl FromUrl for ImageSource {
  type Error = LoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      "http" | "https" => Ok(ImageSource::Url(url.clone())),
      ImageFile::SCHEME | "file" => Ok(ImageSource::File(ImageFile::from_url(url)?)),
      Sample::SCHEME => Ok(ImageSource::Sample(Sample::from_url(url)?)),
      other => Err(LoadError::SchemeMismatch(other.to_string())),
    }
  }
}

impl ImageSource {
  /// 解析命令行上的来源字符串，不带方案的按本地路径处理
  pub fn parse(source: &str) -> Result<Self, LoadError> {
    match Url::parse(source) {
      Ok(url) => Self::from_url(&url),
      Err(url::ParseError::RelativeUrlWithoutBase) => {
        Ok(ImageSource::File(ImageFile::new(PathBuf::from(source))))
      }
      Err(e) => Err(LoadError::InvalidSource(format!("{}: {}", source, e))),
    }
  }

  pub fn describe(&self) -> String {
    match self {
      ImageSource::Url(url) => url.to_string(),
      ImageSource::File(file) => file.path().display().to_string(),
      ImageSource::Sample(sample) => format!("{}:{}", Sample::SCHEME, sample.name()),
      ImageSource::Upload(bytes) => format!("上传数据 ({} 字节)", bytes.len()),
    }
  }
}

/// 图像读取与规范化
#[derive(Debug, Clone)]
pub struct Intake {
  max_width: u32,
  max_height: u32,
  min_side: u32,
  timeout: Duration,
  max_bytes: usize,
}

impl Default for Intake {
  fn default() -> Self {
    Self {
      max_width: DEFAULT_MAX_SIDE,
      max_height: DEFAULT_MAX_SIDE,
      min_side: DEFAULT_MIN_SIDE,
      timeout: DEFAULT_FETCH_TIMEOUT,
      max_bytes: DEFAULT_MAX_BYTES,
    }
  }
}

impl Intake {
  pub fn max_size(mut self, width: u32, height: u32) -> Self {
    self.max_width = width;
    self.max_height = height;
    self
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  pub fn max_bytes(mut self, max_bytes: usize) -> Self {
    self.max_bytes = max_bytes;
    self
  }

  /// 读取来源并返回规范化后的帧
  pub fn load(&self, source: &ImageSource) -> Result<Frame, LoadError> {
    info!("读取图像: {}", source.describe());
    let bytes = self.read_bytes(source)?;
    debug!("图像数据大小: {} 字节", bytes.len());

    let image = decode_image(&bytes)?;
    let frame = normalize(image, (self.max_width, self.max_height), self.min_side)?;
    info!("图像已规范化: {}x{}", frame.width(), frame.height());
    Ok(frame)
  }

  fn read_bytes<'a>(&self, source: &'a ImageSource) -> Result<Cow<'a, [u8]>, LoadError> {
    match source {
      ImageSource::Upload(bytes) => {
        if bytes.len() > self.max_bytes {
          return Err(LoadError::TooLarge(bytes.len() as u64));
        }
        Ok(Cow::Borrowed(bytes.as_slice()))
      }
      ImageSource::File(file) => Ok(Cow::Owned(file.read(self.max_bytes)?)),
      ImageSource::Url(url) => self.fetch(url).map(Cow::Owned),
      ImageSource::Sample(sample) => self.fetch(&sample.url()).map(Cow::Owned),
    }
  }

  #[cfg(feature = "fetch_url")]
  fn fetch(&self, url: &Url) -> Result<Vec<u8>, LoadError> {
    UrlFetcher::new(self.timeout, self.max_bytes).fetch(url)
  }

  #[cfg(not(feature = "fetch_url"))]
  fn fetch(&self, _url: &Url) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::FetchDisabled)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_supported_schemes() {
    assert!(matches!(
      ImageSource::parse("https://example.com/a.jpg").unwrap(),
      ImageSource::Url(_)
    ));
    assert!(matches!(
      ImageSource::parse("image:///tmp/a.png").unwrap(),
      ImageSource::File(_)
    ));
    assert!(matches!(
      ImageSource::parse("file:///tmp/a.png").unwrap(),
      ImageSource::File(_)
    ));
    assert_eq!(
      ImageSource::parse("sample:street").unwrap(),
      ImageSource::Sample(Sample::Street)
    );
  }

  #[test]
  fn plain_path_is_a_file() {
    match ImageSource::parse("photos/cat.jpg").unwrap() {
      ImageSource::File(file) => assert_eq!(file.path(), std::path::Path::new("photos/cat.jpg")),
      other => panic!("unexpected source: {:?}", other),
    }
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    assert!(matches!(
      ImageSource::parse("ftp://example.com/a.jpg"),
      Err(LoadError::SchemeMismatch(s)) if s == "ftp"
    ));
  }

  #[test]
  fn corrupt_upload_fails_to_load() {
    let source = ImageSource::Upload(b"definitely not an image".to_vec());
    assert!(matches!(
      Intake::default().load(&source),
      Err(LoadError::UnsupportedFormat(_))
    ));
  }

  #[test]
  fn oversized_upload_is_rejected() {
    let source = ImageSource::Upload(vec![0u8; 64]);
    assert!(matches!(
      Intake::default().max_bytes(16).load(&source),
      Err(LoadError::TooLarge(64))
    ));
  }

  #[cfg(feature = "fetch_url")]
  #[test]
  fn unreachable_url_is_a_load_error() {
    let source = ImageSource::parse("http://127.0.0.1:9/missing.png").unwrap();
    let intake = Intake::default().timeout(Duration::from_secs(2));
    assert!(matches!(
      intake.load(&source),
      Err(LoadError::Unreachable { .. })
    ));
  }
}
