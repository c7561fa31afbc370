//! 图纸单位到输出单位（厘米）的换算。

use tracing::debug;
use zcad_config::SourceUnits;
use zcad_core::document::Document;
use zcad_core::geometry::Bounds2D;

const MAX_SAMPLED_POINTS: usize = 1000;
/// 图形范围小于该值时推断为米制图纸。
const METER_EXTENT_THRESHOLD: f64 = 2000.0;
const METERS_TO_CM: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSource {
    /// 调用方显式指定。
    Override,
    /// 来自 `$INSUNITS`。
    Header,
    /// 由图形范围估计。
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitResolution {
    /// 图纸单位乘以该系数得到厘米。
    pub scale: f64,
    pub source: UnitSource,
}

/// `$INSUNITS` 代码换算到厘米；0（无单位）和未知代码返回 `None`。
pub fn insunits_scale(code: i16) -> Option<f64> {
    let scale = match code {
        1 => 2.54,
        2 => 30.48,
        3 => 160_934.4,
        4 => 0.1,
        5 => 1.0,
        6 => 100.0,
        7 => 100_000.0,
        8 => 2.54e-6,
        9 => 2.54e-3,
        10 => 91.44,
        11 => 1e-8,
        12 => 1e-7,
        13 => 1e-4,
        14 => 10.0,
        15 => 1_000.0,
        16 => 10_000.0,
        17 => 1e11,
        18 => 1.495_978_707e13,
        19 => 9.460_730_472_580_8e17,
        20 => 3.085_677_6e18,
        _ => return None,
    };
    Some(scale)
}

/// 估计图形的最大边长：优先用有效的头部范围，否则采样实体坐标。
pub fn estimate_extent(doc: &Document) -> f64 {
    if let Some((width, height)) = doc.header.extents_size() {
        return width.max(height);
    }
    let samples = doc
        .entities()
        .flat_map(|entity| entity.sample_points())
        .take(MAX_SAMPLED_POINTS);
    Bounds2D::from_points(samples)
        .map(|bounds| bounds.width().max(bounds.height()))
        .unwrap_or(0.0)
}

pub fn resolve_unit_scale(doc: &Document, source_units: SourceUnits) -> UnitResolution {
    if let Some(scale) = source_units.scale_to_cm() {
        return UnitResolution {
            scale,
            source: UnitSource::Override,
        };
    }
    if let Some(scale) = doc.header.insunits.and_then(insunits_scale) {
        return UnitResolution {
            scale,
            source: UnitSource::Header,
        };
    }
    let extent = estimate_extent(doc);
    let scale = if extent < METER_EXTENT_THRESHOLD {
        METERS_TO_CM
    } else {
        1.0
    };
    debug!(extent, scale, "根据图形范围推断单位");
    UnitResolution {
        scale,
        source: UnitSource::Heuristic,
    }
}
