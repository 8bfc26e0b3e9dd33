// 该文件是 Xunwu （寻物） 项目的一部分。
// src/main.rs - 项目主程序
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

use std::{io::Read, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use xunwu::{
  input::{ImageSource, Intake},
  model::{
    DEFAULT_CONFIDENCE, DEFAULT_OVERLAP, ModelVariant, OwlVitBuilder, Settings, TranslateMode,
    Translator,
  },
  output::{Draw, SaveImageFileOutput, TableFormat},
  task::{OneShotTask, QueryInput, Request, Task},
};

const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Xunwu 开放词汇目标检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型名称，如 google/owlvit-base-patch32 或 base-patch16
  #[arg(long, default_value_t = ModelVariant::default().name().to_string(), value_name = "MODEL")]
  pub model: String,

  /// 本地模型目录（model.onnx、tokenizer.json，可选 image_guided.onnx）
  #[arg(long, value_name = "DIR")]
  pub model_dir: Option<PathBuf>,

  /// 模型缓存目录
  #[arg(long, env = "XUNWU_CACHE_DIR", value_name = "DIR")]
  pub cache_dir: Option<PathBuf>,

  /// 图像引导模型文件路径
  #[arg(long, value_name = "FILE")]
  pub image_guided: Option<PathBuf>,

  /// 输入来源: http(s) 地址、image:///路径、sample:名称、本地路径，或 - 读取标准输入
  #[arg(long, value_name = "SOURCE", required_unless_present = "list_models")]
  pub input: Option<String>,

  /// 文本查询，可重复指定
  #[arg(long, value_name = "TEXT")]
  pub query: Vec<String>,

  /// 参考图像来源，与文本查询互斥
  #[arg(long, value_name = "SOURCE", conflicts_with = "query")]
  pub query_image: Option<String>,

  /// 日文查询翻译方式: dict 仅词典，api 词典查不到时调用在线翻译
  #[arg(long, default_value_t = TranslateMode::Dictionary, value_name = "MODE")]
  pub translate: TranslateMode,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_OVERLAP, value_name = "THRESHOLD")]
  pub overlap: f32,

  /// 输入图像最大边长，超过则等比缩小
  #[arg(long, default_value_t = 800, value_name = "PIXELS")]
  pub max_size: u32,

  /// 标签字体文件 (TTF/OTF)
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 输出 PNG 路径，或输出目录
  #[arg(long, default_value = ".", value_name = "OUTPUT")]
  pub output: PathBuf,

  /// 结果表格式: csv、json 或 none
  #[arg(long, default_value_t = TableFormat::Csv, value_name = "FORMAT")]
  pub table: TableFormat,

  /// 列出可用模型后退出
  #[arg(long)]
  pub list_models: bool,
}

fn read_source(source: &str) -> Result<ImageSource> {
  if source == "-" {
    let mut bytes = Vec::new();
    std::io::stdin()
      .lock()
      .read_to_end(&mut bytes)
      .context("无法读取标准输入")?;
    return Ok(ImageSource::Upload(bytes));
  }
  Ok(ImageSource::parse(source)?)
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  if args.list_models {
    for variant in ModelVariant::ALL {
      println!("{}", variant);
    }
    return Ok(());
  }

  let input = args.input.as_deref().context("缺少输入来源")?;
  info!("模型: {}", args.model);
  info!("输入来源: {}", input);
  info!("输出路径: {}", args.output.display());
  info!("置信度阈值: {}，NMS 阈值: {}", args.confidence, args.overlap);

  let source = read_source(input)?;
  let query = match &args.query_image {
    Some(reference) => QueryInput::Image(read_source(reference)?),
    None => QueryInput::Text(args.query.clone()),
  };

  let task = OneShotTask::new(
    Intake::default().max_size(args.max_size, args.max_size),
    Settings::new(args.confidence, args.overlap),
  )
  .with_translator(Translator::from_mode(args.translate, TRANSLATE_TIMEOUT));
  // 查询与阈值无效时不加载模型
  let request = task.prepare(Request { source, query })?;

  let variant: ModelVariant = args.model.parse()?;
  let mut builder = OwlVitBuilder::new(variant)
    .cache_dir(args.cache_dir.clone())
    .image_guided(args.image_guided.clone());
  if let Some(dir) = &args.model_dir {
    builder = builder.model_dir(dir.clone());
  }
  let model = builder.build()?;
  info!("模型就绪: {}", model.variant());

  let draw = match &args.font {
    Some(path) => Draw::from_font_file(path)?,
    None => Draw::default(),
  };
  let output = SaveImageFileOutput::new(args.output.clone())
    .with_table(args.table)
    .with_draw(draw);

  let completed = task.run_task(request, &model, output)?;

  print!("{}", completed.output.rendered.table.to_csv());
  info!("输出文件: {}", completed.output.image_path.display());
  if let Some(table_path) = &completed.output.table_path {
    info!("结果表: {}", table_path.display());
  }

  Ok(())
}
