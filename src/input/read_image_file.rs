// 该文件是 Xunwu （寻物） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use std::{
  io::Read,
  path::{Path, PathBuf},
};

use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, input::LoadError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
  path: PathBuf,
}

impl FromUrlWithScheme for ImageFile {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFile {
  type Error = LoadError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME && url.scheme() != "file" {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(LoadError::SchemeMismatch(url.scheme().to_string()));
    }

    let path = urlencoding::decode(url.path())
      .map_err(|e| LoadError::InvalidSource(format!("{}: {}", url, e)))?;

    Ok(ImageFile::new(PathBuf::from(path.into_owned())))
  }
}

impl ImageFile {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 读取整个文件，超过 `max_bytes` 时报错
  pub fn read(&self, max_bytes: usize) -> Result<Vec<u8>, LoadError> {
    let file = std::fs::File::open(&self.path)?;
    let size = file.metadata()?.len();
    if size > max_bytes as u64 {
      return Err(LoadError::TooLarge(size));
    }

    let mut data = Vec::with_capacity(size as usize);
    file.take(max_bytes as u64 + 1).read_to_end(&mut data)?;
    if data.len() > max_bytes {
      return Err(LoadError::TooLarge(data.len() as u64));
    }
    Ok(data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_percent_encoded_path() {
    let url = Url::parse("image:///tmp/my%20photo.png").unwrap();
    let file = ImageFile::from_url(&url).unwrap();
    assert_eq!(file.path(), Path::new("/tmp/my photo.png"));
  }

  #[test]
  fn missing_file_is_io_error() {
    let file = ImageFile::new(PathBuf::from("/definitely/not/here.png"));
    assert!(matches!(file.read(1024), Err(LoadError::IoError(_))));
  }

  #[test]
  fn reads_file_contents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blob.bin");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    let file = ImageFile::new(path);
    assert_eq!(file.read(16).unwrap(), vec![1, 2, 3]);
    assert!(matches!(file.read(2), Err(LoadError::TooLarge(3))));
  }
}
