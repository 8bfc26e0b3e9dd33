// 该文件是 Xunwu （寻物） 项目的一部分。
// src/model/translate.rs - 日文查询翻译
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

use std::{fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

#[cfg(feature = "fetch_url")]
mod google;

#[cfg(feature = "fetch_url")]
pub use self::google::GoogleTranslateApi;

#[derive(Error, Debug)]
pub enum TranslateError {
  #[error("未知的翻译方式: {0}，可选 dict 或 api")]
  UnknownMode(String),
  #[error("翻译请求失败: {0}")]
  Request(String),
  #[error("翻译结果无法解析: {0}")]
  Response(String),
}

// 模型只认识英文，日文查询先查词典
const DICTIONARY: &[(&str, &str)] = &[
  // 动物
  ("猫", "cat"),
  ("犬", "dog"),
  ("鳥", "bird"),
  ("馬", "horse"),
  ("牛", "cow"),
  ("豚", "pig"),
  ("羊", "sheep"),
  ("鶏", "chicken"),
  ("魚", "fish"),
  ("ねこ", "cat"),
  ("いぬ", "dog"),
  ("とり", "bird"),
  ("うま", "horse"),
  ("うし", "cow"),
  ("ぶた", "pig"),
  ("ひつじ", "sheep"),
  ("にわとり", "chicken"),
  ("さかな", "fish"),
  // 交通工具
  ("車", "car"),
  ("自動車", "car"),
  ("自転車", "bicycle"),
  ("バイク", "motorcycle"),
  ("オートバイ", "motorcycle"),
  ("バス", "bus"),
  ("電車", "train"),
  ("飛行機", "airplane"),
  ("船", "ship"),
  ("ボート", "boat"),
  ("トラック", "truck"),
  ("くるま", "car"),
  ("じてんしゃ", "bicycle"),
  ("でんしゃ", "train"),
  ("ひこうき", "airplane"),
  ("ふね", "ship"),
  // 家具
  ("椅子", "chair"),
  ("テーブル", "table"),
  ("机", "desk"),
  ("ソファ", "sofa"),
  ("ベッド", "bed"),
  ("棚", "shelf"),
  ("本棚", "bookshelf"),
  ("タンス", "dresser"),
  ("いす", "chair"),
  ("つくえ", "desk"),
  ("たな", "shelf"),
  ("ほんだな", "bookshelf"),
  // 食物
  ("りんご", "apple"),
  ("バナナ", "banana"),
  ("オレンジ", "orange"),
  ("ピザ", "pizza"),
  ("ケーキ", "cake"),
  ("パン", "bread"),
  ("ご飯", "rice"),
  ("ごはん", "rice"),
  ("パスタ", "pasta"),
  ("ハンバーガー", "hamburger"),
  ("サンドイッチ", "sandwich"),
  // 电子设备
  ("リモコン", "remote control"),
  ("テレビのリモコン", "television remote control"),
  ("テレビリモコン", "television remote control"),
  ("テレビ", "television"),
  ("パソコン", "computer"),
  ("コンピューター", "computer"),
  ("スマートフォン", "smartphone"),
  ("スマホ", "smartphone"),
  ("携帯電話", "mobile phone"),
  ("携帯", "mobile phone"),
  ("ケータイ", "mobile phone"),
  ("カメラ", "camera"),
  ("ラジオ", "radio"),
  ("スピーカー", "speaker"),
  ("ヘッドフォン", "headphones"),
  ("イヤホン", "earphones"),
  ("タブレット", "tablet"),
  ("プリンター", "printer"),
  ("キーボード", "keyboard"),
  ("マウス", "mouse"),
  ("モニター", "monitor"),
  ("ディスプレイ", "display"),
  // 日常物品
  ("本", "book"),
  ("ペン", "pen"),
  ("鉛筆", "pencil"),
  ("ノート", "notebook"),
  ("紙", "paper"),
  ("時計", "clock"),
  ("腕時計", "watch"),
  ("財布", "wallet"),
  ("かばん", "bag"),
  ("バッグ", "bag"),
  ("靴", "shoes"),
  ("くつ", "shoes"),
  ("帽子", "hat"),
  ("ぼうし", "hat"),
  ("眼鏡", "glasses"),
  ("めがね", "glasses"),
  ("傘", "umbrella"),
  ("かさ", "umbrella"),
  ("ドア", "door"),
  ("窓", "window"),
  ("まど", "window"),
  ("鍵", "key"),
  ("かぎ", "key"),
  ("電話", "phone"),
  ("でんわ", "phone"),
  ("花瓶", "vase"),
  ("かびん", "vase"),
  ("花", "flower"),
  ("はな", "flower"),
  ("植物", "plant"),
  ("しょくぶつ", "plant"),
  ("木", "tree"),
  ("草", "grass"),
  ("くさ", "grass"),
];

/// 含有非 ASCII 字符即视为需要翻译
pub fn needs_translation(text: &str) -> bool {
  !text.is_ascii()
}

/// 先完全匹配，再按词条长度从长到短做包含匹配；查不到返回 None
pub fn translate(text: &str) -> Option<&'static str> {
  if let Some((_, english)) = DICTIONARY.iter().find(|(japanese, _)| *japanese == text) {
    return Some(english);
  }

  DICTIONARY
    .iter()
    .filter(|(japanese, _)| text.contains(japanese))
    .max_by_key(|(japanese, _)| japanese.chars().count())
    .map(|(_, english)| *english)
}

/// 词典之外的在线翻译
pub trait TranslateApi: Send + Sync {
  fn translate(&self, text: &str) -> Result<String, TranslateError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TranslateMode {
  /// 只查内置词典
  #[default]
  Dictionary,
  /// 词典查不到时调用在线接口
  Api,
}

impl Display for TranslateMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      TranslateMode::Dictionary => write!(f, "dict"),
      TranslateMode::Api => write!(f, "api"),
    }
  }
}

impl FromStr for TranslateMode {
  type Err = TranslateError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "dict" | "dictionary" => Ok(TranslateMode::Dictionary),
      "api" => Ok(TranslateMode::Api),
      _ => Err(TranslateError::UnknownMode(s.to_string())),
    }
  }
}

/// 查询翻译：先查词典，再按需调用在线接口，失败时返回 None
#[derive(Default)]
pub struct Translator {
  api: Option<Box<dyn TranslateApi>>,
}

impl std::fmt::Debug for Translator {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Translator")
      .field("api", &self.api.is_some())
      .finish()
  }
}

impl Translator {
  pub fn dictionary() -> Self {
    Self { api: None }
  }

  pub fn with_api(api: impl TranslateApi + 'static) -> Self {
    Self {
      api: Some(Box::new(api)),
    }
  }

  pub fn from_mode(mode: TranslateMode, timeout: Duration) -> Self {
    match mode {
      TranslateMode::Dictionary => Self::dictionary(),
      #[cfg(feature = "fetch_url")]
      TranslateMode::Api => match GoogleTranslateApi::new(timeout) {
        Ok(api) => Self::with_api(api),
        Err(e) => {
          warn!("在线翻译不可用，仅使用词典: {}", e);
          Self::dictionary()
        }
      },
      #[cfg(not(feature = "fetch_url"))]
      TranslateMode::Api => {
        let _ = timeout;
        warn!("未启用 fetch_url 特性，仅使用词典翻译");
        Self::dictionary()
      }
    }
  }

  pub fn translate(&self, text: &str) -> Option<String> {
    if let Some(english) = translate(text) {
      return Some(english.to_string());
    }

    let api = self.api.as_ref()?;
    match api.translate(text) {
      Ok(english) => {
        let english = english.trim();
        if english.is_empty() || english == text {
          warn!("在线翻译没有给出译文: {}", text);
          None
        } else {
          debug!("在线翻译: {} -> {}", text, english);
          Some(english.to_string())
        }
      }
      Err(e) => {
        warn!("在线翻译失败: {}", e);
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  /// 记录调用次数的在线接口
  struct CountingApi {
    calls: Arc<AtomicUsize>,
    reply: Result<&'static str, ()>,
  }

  impl CountingApi {
    fn new(reply: Result<&'static str, ()>) -> (Self, Arc<AtomicUsize>) {
      let calls = Arc::new(AtomicUsize::new(0));
      (
        Self {
          calls: calls.clone(),
          reply,
        },
        calls,
      )
    }
  }

  impl TranslateApi for CountingApi {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      match self.reply {
        Ok("") => Ok(String::new()),
        Ok("echo") => Ok(text.to_string()),
        Ok(reply) => Ok(reply.to_string()),
        Err(()) => Err(TranslateError::Request("connection refused".to_string())),
      }
    }
  }

  #[test]
  fn exact_match_wins() {
    assert_eq!(translate("猫"), Some("cat"));
    assert_eq!(translate("テレビ"), Some("television"));
  }

  #[test]
  fn longest_contained_entry_is_used() {
    assert_eq!(translate("赤いテレビのリモコン"), Some("television remote control"));
    assert_eq!(translate("白い自転車"), Some("bicycle"));
  }

  #[test]
  fn unknown_text_is_not_translated() {
    assert_eq!(translate("宇宙"), None);
    assert!(!needs_translation("car"));
    assert!(needs_translation("くるま"));
  }

  #[test]
  fn dictionary_hit_does_not_call_the_api() {
    let (api, calls) = CountingApi::new(Ok("kitty"));
    let translator = Translator::with_api(api);
    assert_eq!(translator.translate("猫"), Some("cat".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn dictionary_miss_falls_back_to_the_api() {
    let (api, calls) = CountingApi::new(Ok(" space "));
    let translator = Translator::with_api(api);
    assert_eq!(translator.translate("宇宙"), Some("space".to_string()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn useless_api_replies_leave_text_untranslated() {
    for reply in [Ok(""), Ok("echo"), Err(())] {
      let (api, calls) = CountingApi::new(reply);
      let translator = Translator::with_api(api);
      assert_eq!(translator.translate("宇宙"), None);
      assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
  }

  #[test]
  fn dictionary_mode_never_goes_online() {
    let translator = Translator::from_mode(TranslateMode::Dictionary, Duration::from_secs(1));
    assert_eq!(translator.translate("宇宙"), None);
    assert_eq!(translator.translate("犬"), Some("dog".to_string()));
  }

  #[test]
  fn parses_translate_modes() {
    assert_eq!("dict".parse::<TranslateMode>().unwrap(), TranslateMode::Dictionary);
    assert_eq!("API".parse::<TranslateMode>().unwrap(), TranslateMode::Api);
    assert!("deepl".parse::<TranslateMode>().is_err());
    assert_eq!(TranslateMode::default().to_string(), "dict");
  }
}
