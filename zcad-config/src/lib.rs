use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub import: ImportOptions,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `ZCAD_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("ZCAD_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 源图纸单位。`Auto` 依次参考 `$INSUNITS` 与图形范围推断。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceUnits {
    #[default]
    Auto,
    Meters,
    #[serde(alias = "cm")]
    Centimeters,
    #[serde(alias = "mm")]
    Millimeters,
    Feet,
    Inches,
}

impl SourceUnits {
    /// 换算到输出单位（厘米）的系数；`Auto` 没有固定系数。
    pub fn scale_to_cm(self) -> Option<f64> {
        match self {
            SourceUnits::Auto => None,
            SourceUnits::Meters => Some(100.0),
            SourceUnits::Centimeters => Some(1.0),
            SourceUnits::Millimeters => Some(0.1),
            SourceUnits::Feet => Some(30.48),
            SourceUnits::Inches => Some(2.54),
        }
    }
}

impl FromStr for SourceUnits {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(SourceUnits::Auto),
            "m" | "meters" => Ok(SourceUnits::Meters),
            "cm" | "centimeters" => Ok(SourceUnits::Centimeters),
            "mm" | "millimeters" => Ok(SourceUnits::Millimeters),
            "ft" | "feet" => Ok(SourceUnits::Feet),
            "in" | "inches" => Ok(SourceUnits::Inches),
            other => Err(ConfigError::InvalidValue {
                field: "source_units",
                value: other.to_string(),
            }),
        }
    }
}

/// 导入后对已解析颜色做的统一变换。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    #[default]
    Original,
    #[serde(rename = "fixed-gray-153", alias = "fixedGray153")]
    FixedGray153,
    Grayscale,
    Custom,
}

impl FromStr for ColorScheme {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(ColorScheme::Original),
            "fixed-gray-153" | "fixedgray153" | "fixed-gray" => Ok(ColorScheme::FixedGray153),
            "grayscale" => Ok(ColorScheme::Grayscale),
            "custom" => Ok(ColorScheme::Custom),
            other => Err(ConfigError::InvalidValue {
                field: "color_scheme",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColorScheme::Original => "original",
            ColorScheme::FixedGray153 => "fixed-gray-153",
            ColorScheme::Grayscale => "grayscale",
            ColorScheme::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// 曲线离散精度。块内圆在非相似变换下退化为折线时使用更细的容差。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TessellationConfig {
    #[serde(default = "TessellationConfig::default_curve_tolerance")]
    pub curve_tolerance_deg: f64,
    #[serde(default = "TessellationConfig::default_block_circle_tolerance")]
    pub block_circle_tolerance_deg: f64,
    #[serde(default = "TessellationConfig::default_spline_resolution")]
    pub spline_resolution: u32,
}

impl TessellationConfig {
    fn default_curve_tolerance() -> f64 {
        5.0
    }

    fn default_block_circle_tolerance() -> f64 {
        1.0
    }

    fn default_spline_resolution() -> u32 {
        20
    }
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            curve_tolerance_deg: Self::default_curve_tolerance(),
            block_circle_tolerance_deg: Self::default_block_circle_tolerance(),
            spline_resolution: Self::default_spline_resolution(),
        }
    }
}

/// 一次导入调用的选项，两个输出管线共用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportOptions {
    #[serde(default)]
    pub source_units: SourceUnits,
    #[serde(default)]
    pub color_scheme: ColorScheme,
    #[serde(default)]
    pub custom_color: Option<String>,
    #[serde(default)]
    pub include_paper_space: bool,
    /// 为真时所有图层记录标记为锁定。
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub default_layer_id: Option<String>,
    #[serde(default)]
    pub floor_id: Option<String>,
    #[serde(default)]
    pub tessellation: TessellationConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置项 {field} 的取值 `{value}` 无效")]
    InvalidValue { field: &'static str, value: String },
}
