use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use zcad_config::{AppConfig, ColorScheme, ConfigError, SourceUnits};
use zcad_core::document::Document;
use zcad_import::{import_shapes, import_svg};

/// 把 JSON 形式的 DXF 图纸导入为形状列表与 SVG 底图。
#[derive(Debug, Parser)]
#[command(name = "zcad", version, about)]
struct Cli {
    /// 输入图纸（JSON 文档）。
    input: PathBuf,
    /// 形状列表输出路径；与 `--svg` 均未指定时输出到标准输出。
    #[arg(long, value_name = "PATH")]
    shapes: Option<PathBuf>,
    /// SVG 底图输出路径。
    #[arg(long, value_name = "PATH")]
    svg: Option<PathBuf>,
    /// 配置文件，缺省时按 `ZCAD_CONFIG` 与 `./config/default.toml` 查找。
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// 源图纸单位：auto、m、cm、mm、ft、in。
    #[arg(long)]
    units: Option<SourceUnits>,
    /// 配色方案：original、fixed-gray-153、grayscale、custom。
    #[arg(long)]
    color_scheme: Option<ColorScheme>,
    #[arg(long, value_name = "HEX")]
    custom_color: Option<String>,
    #[arg(long)]
    include_paper_space: bool,
    #[arg(long)]
    read_only: bool,
    #[arg(long, value_name = "ID")]
    default_layer_id: Option<String>,
    #[arg(long, value_name = "ID")]
    floor_id: Option<String>,
    /// 覆盖配置中的日志等级。
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let mut config = load_configuration(cli.config.clone());
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    init_logging(&config);

    if let Err(err) = run(&cli, config) {
        error!(error = %err, "导入失败");
        eprintln!("错误：{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, mut config: AppConfig) -> Result<()> {
    apply_overrides(cli, &mut config);
    let options = &config.import;

    let document = read_document(&cli.input)?;
    info!(
        input = %cli.input.display(),
        entities = document.entities.len(),
        blocks = document.blocks.len(),
        "已读取图纸"
    );

    let write_stdout = cli.shapes.is_none() && cli.svg.is_none();
    if cli.shapes.is_some() || write_stdout {
        let shapes = import_shapes(&document, options).context("生成形状列表失败")?;
        let json = serde_json::to_string_pretty(&shapes).context("序列化形状列表失败")?;
        match &cli.shapes {
            Some(path) => write_output(path, &json)?,
            None => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{json}").context("写入标准输出失败")?;
            }
        }
    }

    if let Some(path) = &cli.svg {
        let svg = import_svg(&document, options).context("生成 SVG 底图失败")?;
        write_output(path, &svg.markup)?;
    }
    Ok(())
}

/// 命令行参数优先于配置文件。
fn apply_overrides(cli: &Cli, config: &mut AppConfig) {
    let options = &mut config.import;
    if let Some(units) = cli.units {
        options.source_units = units;
    }
    if let Some(scheme) = cli.color_scheme {
        options.color_scheme = scheme;
    }
    if let Some(color) = &cli.custom_color {
        options.custom_color = Some(color.clone());
    }
    if cli.include_paper_space {
        options.include_paper_space = true;
    }
    if cli.read_only {
        options.read_only = true;
    }
    if let Some(id) = &cli.default_layer_id {
        options.default_layer_id = Some(id.clone());
    }
    if let Some(id) = &cli.floor_id {
        options.floor_id = Some(id.clone());
    }
    if options.color_scheme == ColorScheme::Custom && options.custom_color.is_none() {
        warn!("custom 配色未指定颜色，将使用黑色");
    }
}

fn read_document(path: &Path) -> Result<Document> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("读取图纸 {} 失败", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("解析图纸 {} 失败", path.display()))
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("创建输出目录 {} 失败", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("写入 {} 失败", path.display()))?;
    info!(path = %path.display(), bytes = content.len(), "已写出结果");
    Ok(())
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            eprintln!("加载指定配置 {} 失败，使用默认配置：{err}", path.display());
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        eprintln!("加载默认配置 {} 失败，使用内建默认值：{err}", path.display());
                    }
                    ConfigError::Context { .. } | ConfigError::InvalidValue { .. } => {
                        eprintln!("加载默认配置失败，使用内建默认值：{err}");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    // 标准输出留给形状 JSON。
    let subscriber = fmt().with_env_filter(filter).with_writer(io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
