//! SVG 底图输出。
//!
//! 块定义只在 `<defs>` 中输出一次，块参照写成 `<use>`；随块属性依靠 SVG 的
//! `currentColor` 与属性继承在引用处取值。顶层实体按图层分组，外层组翻转 Y 轴。

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use quick_xml::escape::escape;
use serde::Serialize;
use tracing::{debug, warn};
use zcad_config::ImportOptions;
use zcad_core::document::{Document, Entity, EntityCommon, Insert, Polyline};
use zcad_core::geometry::{Bounds2D, Point2, Vector2};
use zcad_core::tessellation::tessellate_arc;
use zcad_core::transform::Mat2D;

use crate::convert::{
    insert_placements, mtext_shape, polyline_points, sanitize_id, spline_points, text_shape,
    unique_id,
};
use crate::shapes::{TextAlign, TextBaseline, TextShape};
use crate::style::{DEFAULT_COLOR, Inheritable, StyleResolver, apply_color_scheme};
use crate::units::UnitResolution;

const PADDING_RATIO: f64 = 0.05;
const EMPTY_VIEW_BOX: ViewBox = ViewBox {
    x: 0.0,
    y: 0.0,
    width: 100.0,
    height: 100.0,
};
const HALF_CIRCLE_BULGE_TOLERANCE: f64 = 1e-6;
const LINE_SPACING: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// 由图纸坐标范围计算翻转 Y 轴后的视口，四周留出最大边长 5% 的边距。
    pub fn from_bounds(bounds: Option<Bounds2D>) -> Self {
        let Some(bounds) = bounds else {
            return EMPTY_VIEW_BOX;
        };
        let extent = bounds.width().max(bounds.height());
        let padding = if extent > f64::EPSILON {
            extent * PADDING_RATIO
        } else {
            1.0
        };
        ViewBox {
            x: bounds.min().x() - padding,
            y: -bounds.max().y() - padding,
            width: bounds.width() + padding * 2.0,
            height: bounds.height() + padding * 2.0,
        }
    }

    pub fn to_attribute(&self) -> String {
        format!(
            "{} {} {} {}",
            num(self.x),
            num(self.y),
            num(self.width),
            num(self.height)
        )
    }
}

#[derive(Debug, Clone)]
pub struct SvgImport {
    pub markup: String,
    pub view_box: ViewBox,
    /// 图纸单位到厘米的系数，标记本身保持图纸单位。
    pub units_scale: f64,
}

/// 数值输出：最多 6 位小数，去掉多余的 0，`-0` 记为 `0`。
pub(crate) fn num(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    let text = format!("{rounded:.6}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

fn points_attribute(points: &[Point2]) -> String {
    let mut attribute = String::with_capacity(points.len() * 16);
    for (index, point) in points.iter().enumerate() {
        if index > 0 {
            attribute.push(' ');
        }
        attribute.push_str(&format!("{},{}", num(point.x()), num(point.y())));
    }
    attribute
}

fn matrix_attribute(matrix: &Mat2D) -> String {
    let [a, b, c, d, e, f] = matrix.coefficients();
    format!(
        "matrix({} {} {} {} {} {})",
        num(a),
        num(b),
        num(c),
        num(d),
        num(e),
        num(f)
    )
}

/// 两顶点闭合多段线且两段凸度同号、绝对值为 1 时即为整圆，返回圆心与半径。
pub(crate) fn half_circle_pair(polyline: &Polyline) -> Option<(Point2, f64)> {
    if !polyline.closed || polyline.vertices.len() != 2 {
        return None;
    }
    let first = &polyline.vertices[0];
    let second = &polyline.vertices[1];
    let is_half = |bulge: f64| (bulge.abs() - 1.0).abs() < HALF_CIRCLE_BULGE_TOLERANCE;
    if !(is_half(first.bulge) && is_half(second.bulge)) {
        return None;
    }
    if first.bulge.signum() != second.bulge.signum() {
        return None;
    }
    let radius = first.position.distance(second.position) / 2.0;
    if radius <= f64::EPSILON {
        return None;
    }
    Some((first.position.midpoint(second.position), radius))
}

/// 输出位置：是否位于块定义内，以及该块定义相对顶层图纸的累计缩放。
#[derive(Debug, Clone, Copy)]
struct Scope {
    in_block: bool,
    scale: f64,
}

impl Scope {
    const TOP: Scope = Scope {
        in_block: false,
        scale: 1.0,
    };

    fn block(scale: f64) -> Self {
        Scope {
            in_block: true,
            scale,
        }
    }
}

/// 变换的等效缩放，退化矩阵按 1 处理。
fn uniform_scale(matrix: &Mat2D) -> f64 {
    let scale = matrix.determinant().abs().sqrt();
    if scale > f64::EPSILON { scale } else { 1.0 }
}

struct SvgWriter<'a> {
    doc: &'a Document,
    options: &'a ImportOptions,
    resolver: StyleResolver<'a>,
    units: UnitResolution,
    defs: String,
    /// 键为块名与累计缩放，同一块在不同缩放下各输出一份定义。
    block_ids: HashMap<(String, String), String>,
    used_ids: HashSet<String>,
    expanding: HashSet<String>,
    block_bounds: HashMap<String, Option<Bounds2D>>,
    bounds_expanding: HashSet<String>,
}

impl<'a> SvgWriter<'a> {
    fn new(doc: &'a Document, options: &'a ImportOptions, units: UnitResolution) -> Self {
        Self {
            doc,
            options,
            resolver: StyleResolver::new(doc),
            units,
            defs: String::new(),
            block_ids: HashMap::new(),
            used_ids: HashSet::new(),
            expanding: HashSet::new(),
            block_bounds: HashMap::new(),
            bounds_expanding: HashSet::new(),
        }
    }

    fn scheme(&self, color: &str) -> String {
        apply_color_scheme(
            self.options.color_scheme,
            self.options.custom_color.as_deref(),
            color,
        )
    }

    /// 线宽毫米值换算到顶层图纸单位，再抵消外层 `<use>` 的累计缩放。
    fn stroke_width(&self, millimeters: f64, scale: f64) -> f64 {
        millimeters * 0.1 / self.units.scale / scale
    }

    fn is_visible_at_top(&self, entity: &Entity) -> bool {
        !entity.common().paper_space || self.options.include_paper_space
    }

    fn color_value(&self, common: &EntityCommon, scope: Scope) -> String {
        match self.resolver.resolve_color(common) {
            Inheritable::Resolved(color) => self.scheme(&color),
            Inheritable::ByBlock if scope.in_block => "currentColor".to_string(),
            Inheritable::ByBlock => self.scheme(DEFAULT_COLOR),
        }
    }

    /// 描边属性。块内的随块线宽与线型不写出，由 `<use>` 继承。
    fn stroke_attributes(&self, common: &EntityCommon, scope: Scope) -> String {
        let mut attributes = format!(" stroke=\"{}\"", self.color_value(common, scope));
        let width = match self.resolver.resolve_line_weight(common) {
            Inheritable::Resolved(width) => Some(width),
            Inheritable::ByBlock if scope.in_block => None,
            Inheritable::ByBlock => Some(self.resolver.default_line_weight_mm()),
        };
        if let Some(width) = width {
            attributes.push_str(&format!(
                " stroke-width=\"{}\"",
                num(self.stroke_width(width, scope.scale))
            ));
        }
        match self.resolver.resolve_dash(common) {
            Inheritable::Resolved(pattern) if !pattern.is_empty() => {
                let values: Vec<String> = pattern.iter().map(|length| num(*length)).collect();
                attributes.push_str(&format!(" stroke-dasharray=\"{}\"", values.join(" ")));
            }
            Inheritable::Resolved(_) if scope.in_block => {
                attributes.push_str(" stroke-dasharray=\"none\"")
            }
            _ => {}
        }
        attributes.push_str(" fill=\"none\"");
        attributes
    }

    fn entity_markup(&mut self, entity: &'a Entity, scope: Scope, out: &mut String) {
        let tolerance = self.options.tessellation.curve_tolerance_deg;
        match entity {
            Entity::Line(line) => {
                out.push_str(&format!(
                    "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"{}/>",
                    num(line.start.x()),
                    num(line.start.y()),
                    num(line.end.x()),
                    num(line.end.y()),
                    self.stroke_attributes(&line.common, scope)
                ));
            }
            Entity::Polyline(polyline) => {
                let stroke = self.stroke_attributes(&polyline.common, scope);
                if let Some((center, radius)) = half_circle_pair(polyline) {
                    out.push_str(&format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\"{stroke}/>",
                        num(center.x()),
                        num(center.y()),
                        num(radius)
                    ));
                    return;
                }
                let points = polyline_points(&polyline.vertices, polyline.closed, tolerance);
                if points.len() < 2 {
                    return;
                }
                let tag = if polyline.closed { "polygon" } else { "polyline" };
                out.push_str(&format!(
                    "<{tag} points=\"{}\"{stroke}/>",
                    points_attribute(&points)
                ));
            }
            Entity::Spline(spline) => {
                let points = spline_points(spline, self.options.tessellation.spline_resolution);
                if points.len() < 2 {
                    return;
                }
                let tag = if spline.closed { "polygon" } else { "polyline" };
                out.push_str(&format!(
                    "<{tag} points=\"{}\"{}/>",
                    points_attribute(&points),
                    self.stroke_attributes(&spline.common, scope)
                ));
            }
            Entity::Circle(circle) => {
                if circle.radius <= 0.0 {
                    return;
                }
                out.push_str(&format!(
                    "<circle cx=\"{}\" cy=\"{}\" r=\"{}\"{}/>",
                    num(circle.center.x()),
                    num(circle.center.y()),
                    num(circle.radius),
                    self.stroke_attributes(&circle.common, scope)
                ));
            }
            Entity::Arc(arc) => {
                if arc.radius <= 0.0 {
                    return;
                }
                let points = tessellate_arc(
                    arc.center,
                    arc.radius,
                    arc.start_angle,
                    arc.end_angle,
                    true,
                    tolerance,
                );
                out.push_str(&format!(
                    "<polyline points=\"{}\"{}/>",
                    points_attribute(&points),
                    self.stroke_attributes(&arc.common, scope)
                ));
            }
            Entity::Text(text) => {
                let shape = text_shape(self.doc, text);
                self.text_markup(&shape, &text.common, scope, out);
            }
            Entity::MText(mtext) => {
                let shape = mtext_shape(self.doc, mtext);
                self.text_markup(&shape, &mtext.common, scope, out);
            }
            Entity::Insert(insert) => self.insert_markup(insert, scope, out),
        }
    }

    /// 文字在翻转后的坐标系中以 `scale(sx -1)` 反向翻转，保持正向书写。
    fn text_markup(&self, shape: &TextShape, common: &EntityCommon, scope: Scope, out: &mut String) {
        if shape.content.trim().is_empty() || shape.font_size <= 0.0 {
            return;
        }
        let anchor = match shape.align {
            TextAlign::Left => "start",
            TextAlign::Center => "middle",
            TextAlign::Right => "end",
        };
        let baseline = match shape.baseline {
            TextBaseline::Alphabetic => "alphabetic",
            TextBaseline::Top => "hanging",
            TextBaseline::Middle => "central",
            TextBaseline::Bottom => "text-after-edge",
        };
        out.push_str(&format!(
            "<text transform=\"translate({} {}) rotate({}) scale({} -1)\" font-size=\"{}\"",
            num(shape.position.x()),
            num(shape.position.y()),
            num(shape.rotation.to_degrees()),
            num(shape.scale_x),
            num(shape.font_size)
        ));
        if let Some(family) = &shape.font_family {
            out.push_str(&format!(" font-family=\"{}\"", escape(family.as_str())));
        }
        out.push_str(&format!(
            " text-anchor=\"{anchor}\" dominant-baseline=\"{baseline}\" fill=\"{}\" stroke=\"none\">",
            self.color_value(common, scope)
        ));
        let mut lines = shape.content.split('\n');
        if let Some(first) = lines.next() {
            out.push_str(&escape(first));
        }
        for line in lines {
            out.push_str(&format!(
                "<tspan x=\"0\" dy=\"{}\">{}</tspan>",
                num(shape.font_size * LINE_SPACING),
                escape(line)
            ));
        }
        out.push_str("</text>");
    }

    fn insert_markup(&mut self, insert: &'a Insert, scope: Scope, out: &mut String) {
        let base_point = self
            .doc
            .block(&insert.name)
            .map(|block| block.base_point)
            .unwrap_or(Point2::ORIGIN);
        let color = match self.resolver.resolve_color(&insert.common) {
            Inheritable::Resolved(color) => Some(self.scheme(&color)),
            Inheritable::ByBlock if scope.in_block => None,
            Inheritable::ByBlock => Some(self.scheme(DEFAULT_COLOR)),
        };
        let width = match self.resolver.resolve_line_weight(&insert.common) {
            Inheritable::Resolved(width) => Some(width),
            Inheritable::ByBlock if scope.in_block => None,
            Inheritable::ByBlock => Some(self.resolver.default_line_weight_mm()),
        };
        let dash = match self.resolver.resolve_dash(&insert.common) {
            Inheritable::Resolved(pattern) if !pattern.is_empty() => Some(pattern),
            _ => None,
        };

        for placement in insert_placements(insert, base_point) {
            let local_scale = uniform_scale(&placement);
            let child_scale = scope.scale * local_scale;
            let Some(id) = self.ensure_block(&insert.name, child_scale) else {
                break;
            };
            out.push_str(&format!(
                "<use xlink:href=\"#{id}\" transform=\"{}\"",
                matrix_attribute(&placement)
            ));
            if let Some(color) = &color {
                out.push_str(&format!(" color=\"{color}\""));
            }
            // 继承到块内的线宽与虚线会再被 `<use>` 的变换缩放一次。
            if let Some(width) = width {
                out.push_str(&format!(
                    " stroke-width=\"{}\"",
                    num(self.stroke_width(width, child_scale))
                ));
            }
            if let Some(pattern) = &dash {
                let values: Vec<String> =
                    pattern.iter().map(|length| num(length / local_scale)).collect();
                out.push_str(&format!(" stroke-dasharray=\"{}\"", values.join(" ")));
            }
            out.push_str("/>");
        }

        for attribute in &insert.attributes {
            let shape = text_shape(self.doc, attribute);
            self.text_markup(&shape, &attribute.common, scope, out);
        }
    }

    /// 确保块定义在给定累计缩放下已写入 `<defs>`，返回其元素 id；缺失或循环引用时返回 `None`。
    ///
    /// 块内显式线宽按累计缩放折算，`<use>` 变换放大后仍等于顶层图纸中的绝对线宽。
    fn ensure_block(&mut self, name: &str, scale: f64) -> Option<String> {
        let key = (name.to_string(), num(scale));
        if let Some(id) = self.block_ids.get(&key) {
            return Some(id.clone());
        }
        if self.expanding.contains(name) {
            warn!(block = name, "检测到块的循环引用，已跳过");
            return None;
        }
        let doc = self.doc;
        let Some(block) = doc.block(name) else {
            warn!(block = name, "块参照引用了不存在的块定义");
            return None;
        };

        self.expanding.insert(name.to_string());
        let mut body = String::new();
        for entity in &block.entities {
            self.entity_markup(entity, Scope::block(scale), &mut body);
        }
        self.expanding.remove(name);

        let id = unique_id(format!("blk-{}", sanitize_id(name)), &mut self.used_ids);
        self.defs.push_str(&format!("<g id=\"{id}\">{body}</g>"));
        debug!(block = name, id = %id, scale, "已输出块定义");
        self.block_ids.insert(key, id.clone());
        Some(id)
    }

    /// 非块参照实体在自身坐标系中的范围点，包含凸度弧与样条采样点。
    fn entity_points(&self, entity: &Entity) -> Vec<Point2> {
        let tolerance = self.options.tessellation.curve_tolerance_deg;
        match entity {
            Entity::Line(line) => vec![line.start, line.end],
            Entity::Polyline(polyline) => {
                polyline_points(&polyline.vertices, polyline.closed, tolerance)
            }
            Entity::Spline(spline) => {
                spline_points(spline, self.options.tessellation.spline_resolution)
            }
            Entity::Circle(circle) => vec![
                circle.center.translate(Vector2::new(-circle.radius, -circle.radius)),
                circle.center.translate(Vector2::new(circle.radius, circle.radius)),
            ],
            Entity::Arc(arc) => tessellate_arc(
                arc.center,
                arc.radius,
                arc.start_angle,
                arc.end_angle,
                true,
                tolerance,
            ),
            Entity::Text(text) => vec![text_shape(self.doc, text).position],
            Entity::MText(mtext) => vec![mtext.insert],
            Entity::Insert(insert) => insert
                .attributes
                .iter()
                .map(|attribute| text_shape(self.doc, attribute).position)
                .collect(),
        }
    }

    fn include_entity(&mut self, entity: &'a Entity, matrix: &Mat2D, bounds: &mut Bounds2D) {
        for point in self.entity_points(entity) {
            bounds.include_point(matrix.apply_to_point(point));
        }
        if let Entity::Insert(insert) = entity {
            let Some(local) = self.block_local_bounds(&insert.name) else {
                return;
            };
            let base_point = self
                .doc
                .block(&insert.name)
                .map(|block| block.base_point)
                .unwrap_or(Point2::ORIGIN);
            for placement in insert_placements(insert, base_point) {
                let combined = Mat2D::multiply(matrix, &placement);
                for corner in local.corners() {
                    bounds.include_point(combined.apply_to_point(corner));
                }
            }
        }
    }

    /// 块定义坐标系下的范围，按块名缓存并防止循环。
    fn block_local_bounds(&mut self, name: &str) -> Option<Bounds2D> {
        if let Some(cached) = self.block_bounds.get(name) {
            return *cached;
        }
        if !self.bounds_expanding.insert(name.to_string()) {
            return None;
        }
        let doc = self.doc;
        let mut bounds = Bounds2D::empty();
        if let Some(block) = doc.block(name) {
            for entity in &block.entities {
                self.include_entity(entity, &Mat2D::identity(), &mut bounds);
            }
        }
        self.bounds_expanding.remove(name);
        let result = if bounds.is_empty() { None } else { Some(bounds) };
        self.block_bounds.insert(name.to_string(), result);
        result
    }

    fn write_document(mut self) -> SvgImport {
        let doc = self.doc;
        let mut groups: IndexMap<String, String> = doc
            .layers()
            .map(|layer| (layer.name.clone(), String::new()))
            .collect();
        let mut bounds = Bounds2D::empty();

        for entity in &doc.entities {
            if !self.is_visible_at_top(entity) {
                continue;
            }
            self.include_entity(entity, &Mat2D::identity(), &mut bounds);
            let mut markup = String::new();
            self.entity_markup(entity, Scope::TOP, &mut markup);
            groups
                .entry(entity.layer_name().to_string())
                .or_default()
                .push_str(&markup);
        }

        let view_box = ViewBox::from_bounds(if bounds.is_empty() { None } else { Some(bounds) });
        let mut markup = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" viewBox=\"{}\">",
            view_box.to_attribute()
        );
        if !self.defs.is_empty() {
            markup.push_str(&format!("<defs>{}</defs>", self.defs));
        }
        markup.push_str("<g transform=\"matrix(1 0 0 -1 0 0)\">");
        for (layer_name, content) in &groups {
            if content.is_empty() {
                continue;
            }
            let id = unique_id(format!("layer-{}", sanitize_id(layer_name)), &mut self.used_ids);
            let displayed = doc.layer(layer_name).map(|def| def.is_displayed()).unwrap_or(true);
            markup.push_str(&format!(
                "<g id=\"{id}\" data-layer=\"{}\"",
                escape(layer_name.as_str())
            ));
            if !displayed {
                markup.push_str(" display=\"none\"");
            }
            markup.push_str(&format!(">{content}</g>"));
        }
        markup.push_str("</g></svg>");

        SvgImport {
            markup,
            view_box,
            units_scale: self.units.scale,
        }
    }
}

pub(crate) fn write_svg(doc: &Document, options: &ImportOptions, units: UnitResolution) -> SvgImport {
    SvgWriter::new(doc, options, units).write_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zcad_core::document::PolylineVertex;

    #[test]
    fn numbers_are_trimmed() {
        assert_eq!(num(1.0), "1");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(2.5), "2.5");
        assert_eq!(num(1.0 / 3.0), "0.333333");
        assert_eq!(num(-1e-9), "0");
    }

    #[test]
    fn view_box_pads_and_flips() {
        let bounds = Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(100.0, 50.0));
        let view_box = ViewBox::from_bounds(Some(bounds));
        assert!((view_box.x + 5.0).abs() < 1e-12);
        assert!((view_box.y + 55.0).abs() < 1e-12);
        assert!((view_box.width - 110.0).abs() < 1e-12);
        assert!((view_box.height - 60.0).abs() < 1e-12);
        assert_eq!(ViewBox::from_bounds(None), EMPTY_VIEW_BOX);
    }

    #[test]
    fn half_circle_detection_requires_matching_bulges() {
        let mut polyline = Polyline {
            common: EntityCommon::default(),
            vertices: vec![
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), -1.0),
                PolylineVertex::with_bulge(Point2::new(4.0, 0.0), -1.0),
            ],
            closed: true,
        };
        let (center, radius) = half_circle_pair(&polyline).expect("两段半圆组成整圆");
        assert_eq!(center, Point2::new(2.0, 0.0));
        assert!((radius - 2.0).abs() < 1e-12);

        polyline.vertices[1].bulge = 1.0;
        assert!(half_circle_pair(&polyline).is_none());
        polyline.vertices[1].bulge = -1.0;
        polyline.closed = false;
        assert!(half_circle_pair(&polyline).is_none());
    }
}
