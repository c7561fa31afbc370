//! 形状列表输出的记录类型。

use serde::Serialize;
use zcad_core::geometry::{Bounds2D, Point2, Vector2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    Alphabetic,
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextShape {
    pub position: Point2,
    /// 弧度，逆时针为正。
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub content: String,
    pub font_size: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    pub align: TextAlign,
    pub baseline: TextBaseline,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ShapeGeometry {
    Line { start: Point2, end: Point2 },
    Polyline { points: Vec<Point2> },
    Polygon { points: Vec<Point2> },
    Circle { center: Point2, radius: f64 },
    Text(TextShape),
}

impl ShapeGeometry {
    pub fn kind(&self) -> &'static str {
        match self {
            ShapeGeometry::Line { .. } => "line",
            ShapeGeometry::Polyline { .. } => "polyline",
            ShapeGeometry::Polygon { .. } => "polygon",
            ShapeGeometry::Circle { .. } => "circle",
            ShapeGeometry::Text(_) => "text",
        }
    }

    /// 参与范围计算的点：折线取顶点，圆取包围盒角点，文字取插入点。
    pub fn extent_points(&self) -> Vec<Point2> {
        match self {
            ShapeGeometry::Line { start, end } => vec![*start, *end],
            ShapeGeometry::Polyline { points } | ShapeGeometry::Polygon { points } => {
                points.clone()
            }
            ShapeGeometry::Circle { center, radius } => vec![
                center.translate(Vector2::new(-radius, -radius)),
                center.translate(Vector2::new(*radius, *radius)),
            ],
            ShapeGeometry::Text(text) => vec![text.position],
        }
    }

    pub fn bounds(&self) -> Option<Bounds2D> {
        Bounds2D::from_points(self.extent_points())
    }

    pub fn translate(&mut self, offset: Vector2) {
        match self {
            ShapeGeometry::Line { start, end } => {
                *start = start.translate(offset);
                *end = end.translate(offset);
            }
            ShapeGeometry::Polyline { points } | ShapeGeometry::Polygon { points } => {
                for point in points.iter_mut() {
                    *point = point.translate(offset);
                }
            }
            ShapeGeometry::Circle { center, .. } => *center = center.translate(offset),
            ShapeGeometry::Text(text) => text.position = text.position.translate(offset),
        }
    }

    /// 长度为零的线、半径为零的圆、空白文字等无法显示的几何。
    pub fn is_degenerate(&self) -> bool {
        const EPSILON: f64 = 1e-9;
        let all_finite = self.extent_points().iter().all(|point| point.is_finite());
        if !all_finite {
            return true;
        }
        match self {
            ShapeGeometry::Line { start, end } => start.approx_eq(*end, EPSILON),
            ShapeGeometry::Polyline { points } | ShapeGeometry::Polygon { points } => {
                match points.first() {
                    Some(first) => points.iter().all(|point| point.approx_eq(*first, EPSILON)),
                    None => true,
                }
            }
            ShapeGeometry::Circle { radius, .. } => !(radius.is_finite() && *radius > EPSILON),
            ShapeGeometry::Text(text) => {
                text.content.trim().is_empty() || !(text.font_size.is_finite() && text.font_size > 0.0)
            }
        }
    }
}

/// 输出形状。颜色与虚线均为最终值，不含随块占位。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeRecord {
    pub id: String,
    pub layer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<String>,
    pub stroke_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    /// 线宽，输出单位（厘米）。
    pub stroke_width: f64,
    pub stroke_dash: Vec<f64>,
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
}

impl ShapeRecord {
    pub fn text(&self) -> Option<&TextShape> {
        match &self.geometry {
            ShapeGeometry::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRecord {
    pub id: String,
    pub name: String,
    pub color: String,
    pub visible: bool,
    pub locked: bool,
}

/// 导入过程计数，用于日志与测试观察。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub entities_total: usize,
    pub entities_converted: usize,
    pub entities_skipped: usize,
    pub shapes_dropped: usize,
    /// 块定义实际展开次数，同名块只展开一次。
    pub block_expansions: usize,
    pub block_instances: usize,
    pub cyclic_references: usize,
    pub missing_blocks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShapeImport {
    pub shapes: Vec<ShapeRecord>,
    pub layers: Vec<LayerRecord>,
    pub width: f64,
    pub height: f64,
    /// 平移前的最小角点（输出单位）。
    pub origin: Point2,
    pub units_scale: f64,
    pub stats: ImportStats,
}

impl ShapeImport {
    pub fn layer(&self, id: &str) -> Option<&LayerRecord> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn shapes_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a ShapeRecord> {
        self.shapes
            .iter()
            .filter(move |shape| shape.geometry.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_serializes_with_flattened_geometry() {
        let record = ShapeRecord {
            id: "dxf-shape-1".into(),
            layer_id: "dxf-layer-0".into(),
            floor_id: None,
            stroke_color: "#FF0000".into(),
            fill_color: None,
            stroke_width: 0.025,
            stroke_dash: Vec::new(),
            geometry: ShapeGeometry::Circle {
                center: Point2::new(1.0, 2.0),
                radius: 3.0,
            },
        };
        let value = serde_json::to_value(&record).expect("序列化形状失败");
        assert_eq!(value["type"], "circle");
        assert_eq!(value["radius"], 3.0);
        assert_eq!(value["center"][1], 2.0);
        assert!(value.get("floor_id").is_none());
    }

    #[test]
    fn degenerate_geometry_detection() {
        let point = Point2::new(1.0, 1.0);
        assert!(ShapeGeometry::Line { start: point, end: point }.is_degenerate());
        assert!(ShapeGeometry::Polyline { points: vec![point, point, point] }.is_degenerate());
        assert!(ShapeGeometry::Circle { center: point, radius: 0.0 }.is_degenerate());
        assert!(
            !ShapeGeometry::Polygon {
                points: vec![point, Point2::new(2.0, 1.0), Point2::new(2.0, 2.0)]
            }
            .is_degenerate()
        );
        let blank = TextShape {
            position: point,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            content: "  ".into(),
            font_size: 2.5,
            font_family: None,
            align: TextAlign::Left,
            baseline: TextBaseline::Alphabetic,
        };
        assert!(ShapeGeometry::Text(blank).is_degenerate());
    }
}
