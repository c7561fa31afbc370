//! 颜色、线宽、线型的继承链解析与配色方案。

use zcad_config::ColorScheme;
use zcad_core::document::{ColorSpec, Document, EntityCommon, LineWeightSpec};

/// 默认颜色：ACI 7 在浅色画布上绘制为黑色。
pub const DEFAULT_COLOR: &str = "#000000";
const FIXED_GRAY: &str = "#999999";
const BY_LAYER: &str = "BYLAYER";
const BY_BLOCK: &str = "BYBLOCK";
const CONTINUOUS: &str = "CONTINUOUS";
/// 线型中长度为 0 的“点”在输出中用此长度表示。
const DOT_LENGTH: f64 = 0.01;

/// 可延迟到块参照再确定的属性值。
#[derive(Debug, Clone, PartialEq)]
pub enum Inheritable<T> {
    Resolved(T),
    ByBlock,
}

impl<T: Clone> Inheritable<T> {
    #[inline]
    pub fn is_by_block(&self) -> bool {
        matches!(self, Inheritable::ByBlock)
    }

    /// 随块值由外层（块参照）的值替换，外层本身也可能仍是随块。
    pub fn inherit_from(&self, parent: &Inheritable<T>) -> Inheritable<T> {
        match self {
            Inheritable::Resolved(value) => Inheritable::Resolved(value.clone()),
            Inheritable::ByBlock => parent.clone(),
        }
    }

    pub fn resolve_or(&self, fallback: T) -> T {
        match self {
            Inheritable::Resolved(value) => value.clone(),
            Inheritable::ByBlock => fallback,
        }
    }

    pub fn map<U>(&self, f: impl FnOnce(&T) -> U) -> Inheritable<U> {
        match self {
            Inheritable::Resolved(value) => Inheritable::Resolved(f(value)),
            Inheritable::ByBlock => Inheritable::ByBlock,
        }
    }
}

pub type ColorValue = Inheritable<String>;
/// 虚线段长度序列，空序列表示实线。
pub type DashValue = Inheritable<Vec<f64>>;
/// 线宽，单位毫米。
pub type LineWeightValue = Inheritable<f64>;

const FIXED_ACI: [(u8, &str); 9] = [
    (1, "#FF0000"),
    (2, "#FFFF00"),
    (3, "#00FF00"),
    (4, "#00FFFF"),
    (5, "#0000FF"),
    (6, "#FF00FF"),
    (7, DEFAULT_COLOR),
    (8, "#808080"),
    (9, "#C0C0C0"),
];

const GRAY_ACI: [&str; 6] = ["#333333", "#505050", "#696969", "#828282", "#BEBEBE", "#FFFFFF"];

const ACI_VALUES: [f64; 5] = [1.0, 0.8, 0.6, 0.5, 0.3];

fn hsv_to_hex(hue_deg: f64, saturation: f64, value: f64) -> String {
    let chroma = value * saturation;
    let sector = (hue_deg / 60.0).rem_euclid(6.0);
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f64| ((c + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02X}{:02X}{:02X}", channel(r), channel(g), channel(b))
}

/// ACI 颜色号转十六进制颜色。
///
/// 1-9 为固定色，10-249 按色相每 10 个一组（偶数全饱和、奇数半饱和，五档明度），
/// 250-255 为灰阶。
pub fn aci_to_hex(index: u8) -> String {
    match index {
        1..=9 => FIXED_ACI
            .iter()
            .find(|(aci, _)| *aci == index)
            .map(|(_, hex)| (*hex).to_string())
            .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        10..=249 => {
            let hue = f64::from((index - 10) / 10) * 15.0;
            let offset = index % 10;
            let value = ACI_VALUES[usize::from(offset / 2)];
            let saturation = if offset % 2 == 0 { 1.0 } else { 0.5 };
            hsv_to_hex(hue, saturation, value)
        }
        250..=255 => GRAY_ACI[usize::from(index - 250)].to_string(),
        _ => DEFAULT_COLOR.to_string(),
    }
}

#[inline]
pub fn true_color_to_hex(rgb: u32) -> String {
    format!("#{:06X}", rgb & 0x00FF_FFFF)
}

fn parse_hex(color: &str) -> Option<(u8, u8, u8)> {
    let digits = color.strip_prefix('#')?;
    match digits.len() {
        6 => {
            let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
            let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
            let b = u8::from_str_radix(&digits[4..6], 16).ok()?;
            Some((r, g, b))
        }
        3 => {
            let expand = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).ok().map(|v| v * 17);
            Some((expand(0)?, expand(1)?, expand(2)?))
        }
        _ => None,
    }
}

/// 对已解析的颜色应用配色方案。
pub fn apply_color_scheme(scheme: ColorScheme, custom_color: Option<&str>, color: &str) -> String {
    match scheme {
        ColorScheme::Original => color.to_string(),
        ColorScheme::FixedGray153 => FIXED_GRAY.to_string(),
        ColorScheme::Grayscale => match parse_hex(color) {
            Some((r, g, b)) => {
                let luminance =
                    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
                let level = luminance.round().clamp(0.0, 255.0) as u8;
                format!("#{level:02X}{level:02X}{level:02X}")
            }
            None => color.to_string(),
        },
        ColorScheme::Custom => custom_color
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_COLOR)
            .to_string(),
    }
}

/// 内置线型，在线型表缺少对应条目时使用。
pub fn builtin_line_type(name: &str) -> Option<&'static [f64]> {
    let pattern: &'static [f64] = match name.to_ascii_uppercase().as_str() {
        "DASHED" => &[0.5, -0.25],
        "HIDDEN" => &[0.25, -0.125],
        "CENTER" => &[1.25, -0.25, 0.25, -0.25],
        "PHANTOM" => &[1.25, -0.25, 0.25, -0.25, 0.25, -0.25],
        "DOT" => &[0.0, -0.25],
        "DASHDOT" => &[0.5, -0.25, 0.0, -0.25],
        CONTINUOUS => &[],
        _ => return None,
    };
    Some(pattern)
}

/// 基于文档表的样式解析器，只读借用文档。
#[derive(Debug, Clone, Copy)]
pub struct StyleResolver<'a> {
    doc: &'a Document,
}

impl<'a> StyleResolver<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    /// 图层颜色：真彩色优先，其次颜色号；未定义的图层按 ACI 7 处理。
    pub fn layer_color(&self, layer: &str) -> String {
        match self.doc.layer(layer) {
            Some(def) => match def.true_color {
                Some(rgb) => true_color_to_hex(rgb),
                None => match ColorSpec::from_index(def.color_index) {
                    ColorSpec::Index(index) => aci_to_hex(index),
                    _ => DEFAULT_COLOR.to_string(),
                },
            },
            None => aci_to_hex(7),
        }
    }

    pub fn resolve_color(&self, common: &EntityCommon) -> ColorValue {
        match common.color() {
            ColorSpec::TrueColor(rgb) => Inheritable::Resolved(true_color_to_hex(rgb)),
            ColorSpec::Index(index) => Inheritable::Resolved(aci_to_hex(index)),
            ColorSpec::ByBlock => Inheritable::ByBlock,
            ColorSpec::ByLayer => Inheritable::Resolved(self.layer_color(&common.layer)),
        }
    }

    /// `$LWDEFAULT` 换算为毫米。
    pub fn default_line_weight_mm(&self) -> f64 {
        f64::from(self.doc.header.default_line_weight.max(0)) / 100.0
    }

    fn layer_line_weight_mm(&self, layer: &str) -> f64 {
        let raw = self.doc.layer(layer).and_then(|def| def.line_weight);
        match raw.map(LineWeightSpec::from_raw) {
            Some(LineWeightSpec::Value(value)) => f64::from(value) / 100.0,
            _ => self.default_line_weight_mm(),
        }
    }

    pub fn resolve_line_weight(&self, common: &EntityCommon) -> LineWeightValue {
        match common.line_weight() {
            LineWeightSpec::Value(value) => Inheritable::Resolved(f64::from(value) / 100.0),
            LineWeightSpec::ByBlock => Inheritable::ByBlock,
            LineWeightSpec::ByLayer => {
                Inheritable::Resolved(self.layer_line_weight_mm(&common.layer))
            }
            LineWeightSpec::Default => Inheritable::Resolved(self.default_line_weight_mm()),
        }
    }

    fn pattern_for(&self, name: &str) -> Vec<f64> {
        if let Some(def) = self.doc.line_type(name) {
            return def.pattern.clone();
        }
        builtin_line_type(name).map(<[f64]>::to_vec).unwrap_or_default()
    }

    /// 线型解析，结果已按 `$LTSCALE × 实体线型比例` 缩放。
    pub fn resolve_dash(&self, common: &EntityCommon) -> DashValue {
        let explicit = common
            .line_type
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());
        let name = match explicit {
            Some(name) if name.eq_ignore_ascii_case(BY_BLOCK) => return Inheritable::ByBlock,
            Some(name) if !name.eq_ignore_ascii_case(BY_LAYER) => Some(name.to_string()),
            _ => self
                .doc
                .layer(&common.layer)
                .and_then(|def| def.line_type.clone())
                .filter(|name| {
                    !name.eq_ignore_ascii_case(BY_LAYER) && !name.eq_ignore_ascii_case(BY_BLOCK)
                }),
        };
        let Some(name) = name else {
            return Inheritable::Resolved(Vec::new());
        };
        let scale = self.doc.header.ltscale * common.line_type_scale.unwrap_or(1.0);
        Inheritable::Resolved(scale_pattern(&self.pattern_for(&name), scale))
    }
}

/// 取各段绝对值、零长度段改为点长，再乘以比例。
pub fn scale_pattern(pattern: &[f64], scale: f64) -> Vec<f64> {
    let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    pattern
        .iter()
        .map(|length| {
            let magnitude = length.abs();
            let magnitude = if magnitude < 1e-9 { DOT_LENGTH } else { magnitude };
            magnitude * scale
        })
        .collect()
}
