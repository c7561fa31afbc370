//! 实体转换：逐实体解析样式并离散几何，递归展开块参照，最后生成形状记录。

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, warn};
use zcad_config::ImportOptions;
use zcad_core::document::{
    Arc, Document, Entity, EntityCommon, Insert, MText, Polyline, PolylineVertex, Spline, Text,
    TextStyle,
};
use zcad_core::geometry::{Point2, Vector2};
use zcad_core::tessellation::{
    tessellate_arc, tessellate_bulge, tessellate_circle, tessellate_spline,
};
use zcad_core::transform::Mat2D;

use crate::MAX_ENTITIES;
use crate::shapes::{
    ImportStats, LayerRecord, ShapeGeometry, ShapeRecord, TextAlign, TextBaseline, TextShape,
};
use crate::style::{
    ColorValue, DEFAULT_COLOR, DashValue, LineWeightValue, StyleResolver, apply_color_scheme,
};
use crate::text::{decode_mtext, decode_special_codes};

/// 毫米到输出单位（厘米）。
const MM_TO_OUTPUT: f64 = 0.1;
const DEFAULT_LAYER_NAME: &str = "0";

/// 把名称转换为可用作标识符的形式：保留 ASCII 字母数字、`-` 与 `_`。
pub(crate) fn sanitize_id(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

/// 在已用集合中为 `base` 分配不重复的标识符。
pub(crate) fn unique_id(base: String, used: &mut HashSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

/// 多段线顶点连同凸度弧内部点。闭合时不重复首点。
pub(crate) fn polyline_points(
    vertices: &[PolylineVertex],
    closed: bool,
    tolerance_deg: f64,
) -> Vec<Point2> {
    let count = vertices.len();
    let mut points = Vec::with_capacity(count);
    for (index, vertex) in vertices.iter().enumerate() {
        points.push(vertex.position);
        let next = if index + 1 < count {
            Some(&vertices[index + 1])
        } else if closed && count > 1 {
            Some(&vertices[0])
        } else {
            None
        };
        if let Some(next) = next {
            points.extend(tessellate_bulge(
                vertex.position,
                next.position,
                vertex.bulge,
                tolerance_deg,
            ));
        }
    }
    if closed && points.len() > 2 {
        let first = points[0];
        if points.last().is_some_and(|last| last.approx_eq(first, 1e-12)) {
            points.pop();
        }
    }
    points
}

/// 块参照每个阵列单元的局部变换 `T(插入点) · R · S · T(-基点)`。
pub(crate) fn insert_placements(insert: &Insert, base_point: Point2) -> Vec<Mat2D> {
    let rotation = Mat2D::from_rotation(insert.rotation);
    let scale = Mat2D::from_scaling(insert.scale.x(), insert.scale.y());
    let to_base = Mat2D::from_translation(-base_point.x(), -base_point.y());
    let Some(offsets) = insert.array_offsets(MAX_ENTITIES) else {
        warn!(
            block = %insert.name,
            columns = insert.column_count,
            rows = insert.row_count,
            "阵列单元数超过上限，已跳过"
        );
        return Vec::new();
    };
    offsets
        .into_iter()
        .map(|offset| {
            let origin = insert.insert.translate(rotation.apply_to_vector(offset));
            Mat2D::from_translation(origin.x(), origin.y()) * rotation * scale * to_base
        })
        .collect()
}

/// TEXT 对齐码转换为输出对齐方式。
pub(crate) fn text_alignment(horizontal: i16, vertical: i16) -> (TextAlign, TextBaseline) {
    let align = match horizontal {
        1 | 4 => TextAlign::Center,
        2 => TextAlign::Right,
        _ => TextAlign::Left,
    };
    let baseline = match (horizontal, vertical) {
        (4, _) | (_, 2) => TextBaseline::Middle,
        (_, 1) => TextBaseline::Bottom,
        (_, 3) => TextBaseline::Top,
        _ => TextBaseline::Alphabetic,
    };
    (align, baseline)
}

/// MTEXT 附着点 1-9 转换为对齐方式。
pub(crate) fn attachment_alignment(attachment: i16) -> (TextAlign, TextBaseline) {
    let index = if (1..=9).contains(&attachment) {
        attachment - 1
    } else {
        0
    };
    let align = match index % 3 {
        0 => TextAlign::Left,
        1 => TextAlign::Center,
        _ => TextAlign::Right,
    };
    let baseline = match index / 3 {
        0 => TextBaseline::Top,
        1 => TextBaseline::Middle,
        _ => TextBaseline::Bottom,
    };
    (align, baseline)
}

/// TEXT 的定位点：对齐方式非默认（且不是对齐/布满）时使用对齐点。
pub(crate) fn text_anchor(text: &Text) -> Point2 {
    let uses_alignment_point = (text.horizontal_alignment != 0 || text.vertical_alignment != 0)
        && !matches!(text.horizontal_alignment, 3 | 5);
    if uses_alignment_point {
        text.alignment_point.unwrap_or(text.insert)
    } else {
        text.insert
    }
}

/// 样条采样点：可求值时按 Cox–de Boor 采样，否则退回拟合点或控制点。
pub(crate) fn spline_points(spline: &Spline, resolution: u32) -> Vec<Point2> {
    let evaluable = spline.degree > 0 && spline.control_points.len() > spline.degree;
    if evaluable {
        let knots = (!spline.knots.is_empty()).then_some(spline.knots.as_slice());
        let weights = (!spline.weights.is_empty()).then_some(spline.weights.as_slice());
        tessellate_spline(&spline.control_points, spline.degree, knots, weights, resolution)
    } else if spline.fit_points.len() >= 2 {
        spline.fit_points.clone()
    } else {
        spline.control_points.clone()
    }
}

fn find_text_style<'d>(doc: &'d Document, name: Option<&str>) -> Option<&'d TextStyle> {
    let name = name?;
    doc.text_style(name).or_else(|| {
        doc.tables
            .style
            .styles
            .values()
            .find(|style| style.name.eq_ignore_ascii_case(name))
    })
}

/// 样式固定字高优先；实体字高为 0 时退回 `$TEXTSIZE`。
fn text_height(doc: &Document, style: Option<&TextStyle>, height: f64) -> f64 {
    match style.map(|style| style.fixed_height) {
        Some(fixed) if fixed > 0.0 => fixed,
        _ if height > 0.0 => height,
        _ => doc.header.text_size,
    }
}

fn font_family(style: Option<&TextStyle>) -> Option<String> {
    let font = style?.font.as_deref()?;
    Path::new(font)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

fn style_width(style: Option<&TextStyle>) -> f64 {
    style
        .map(|style| style.width_factor)
        .filter(|factor| factor.is_finite() && *factor > 0.0)
        .unwrap_or(1.0)
}

/// TEXT / ATTRIB 的文字形状，位于实体坐标系。
pub(crate) fn text_shape(doc: &Document, text: &Text) -> TextShape {
    let style = find_text_style(doc, text.style.as_deref());
    let (align, baseline) = text_alignment(text.horizontal_alignment, text.vertical_alignment);
    let width_factor = if text.width_factor > 0.0 {
        text.width_factor
    } else {
        1.0
    };
    TextShape {
        position: text_anchor(text),
        rotation: text.rotation,
        scale_x: width_factor * style_width(style),
        scale_y: 1.0,
        content: decode_special_codes(&text.content),
        font_size: text_height(doc, style, text.height),
        font_family: font_family(style),
        align,
        baseline,
    }
}

pub(crate) fn mtext_shape(doc: &Document, mtext: &MText) -> TextShape {
    let style = find_text_style(doc, mtext.style.as_deref());
    let decoded = decode_mtext(&mtext.content);
    let base_height = text_height(doc, style, mtext.height);
    let font_size = decoded
        .height
        .map(|height| height.apply(base_height))
        .filter(|height| *height > 0.0)
        .unwrap_or(base_height);
    let width_factor = decoded
        .width_factor
        .filter(|factor| *factor > 0.0)
        .unwrap_or(1.0);
    let (align, baseline) = attachment_alignment(mtext.attachment_point);
    TextShape {
        position: mtext.insert,
        rotation: mtext.rotation,
        scale_x: width_factor * style_width(style),
        scale_y: 1.0,
        content: decoded.content,
        font_size,
        font_family: font_family(style),
        align,
        baseline,
    }
}

/// 尚未确定随块属性的中间形状。
#[derive(Debug, Clone)]
pub(crate) struct DraftShape {
    pub layer: String,
    pub color: ColorValue,
    pub line_weight: LineWeightValue,
    pub dash: DashValue,
    pub geometry: ShapeGeometry,
}

/// 块参照自身解析出的属性，传给随块子实体。
#[derive(Debug, Clone)]
struct InheritedStyle {
    color: ColorValue,
    line_weight: LineWeightValue,
    dash: DashValue,
}

impl DraftShape {
    /// 按变换映射几何。非相似变换下的圆用 `circle_tolerance_deg` 重新离散为多边形。
    fn transformed(&self, matrix: &Mat2D, circle_tolerance_deg: f64) -> DraftShape {
        if matrix.is_identity() {
            return self.clone();
        }
        let map_points = |points: &[Point2]| -> Vec<Point2> {
            points.iter().map(|point| matrix.apply_to_point(*point)).collect()
        };
        let geometry = match &self.geometry {
            ShapeGeometry::Line { start, end } => ShapeGeometry::Line {
                start: matrix.apply_to_point(*start),
                end: matrix.apply_to_point(*end),
            },
            ShapeGeometry::Polyline { points } => ShapeGeometry::Polyline {
                points: map_points(points),
            },
            ShapeGeometry::Polygon { points } => ShapeGeometry::Polygon {
                points: map_points(points),
            },
            ShapeGeometry::Circle { center, radius } => {
                let similarity = matrix.is_similarity_transform();
                if similarity.ok {
                    ShapeGeometry::Circle {
                        center: matrix.apply_to_point(*center),
                        radius: radius * similarity.scale,
                    }
                } else {
                    let mut outline = tessellate_circle(*center, *radius, circle_tolerance_deg);
                    outline.pop();
                    ShapeGeometry::Polygon {
                        points: map_points(&outline),
                    }
                }
            }
            ShapeGeometry::Text(text) => {
                let mut placed = text.clone();
                placed.position = matrix.apply_to_point(text.position);
                let direction = matrix.apply_to_vector(Vector2::from_angle(text.rotation));
                let length = direction.length();
                if length > f64::EPSILON {
                    placed.rotation = direction.angle();
                    placed.scale_x = text.scale_x * length;
                    // 行列式为负（镜像）时竖向缩放随之取反。
                    placed.scale_y = text.scale_y * matrix.determinant() / length;
                }
                ShapeGeometry::Text(placed)
            }
        };
        let length_scale = matrix.determinant().abs().sqrt();
        DraftShape {
            layer: self.layer.clone(),
            color: self.color.clone(),
            line_weight: self.line_weight.clone(),
            dash: self
                .dash
                .map(|pattern| pattern.iter().map(|length| length * length_scale).collect()),
            geometry,
        }
    }

    fn inherit_from(mut self, parent: &InheritedStyle) -> DraftShape {
        self.color = self.color.inherit_from(&parent.color);
        self.line_weight = self.line_weight.inherit_from(&parent.line_weight);
        self.dash = self.dash.inherit_from(&parent.dash);
        self
    }
}

/// 单次导入调用的状态：块缓存与正在展开的块集合只在本次调用内有效。
pub(crate) struct ConversionContext<'a> {
    doc: &'a Document,
    options: &'a ImportOptions,
    resolver: StyleResolver<'a>,
    block_cache: HashMap<String, Rc<Vec<DraftShape>>>,
    expanding: HashSet<String>,
    pub stats: ImportStats,
}

impl<'a> ConversionContext<'a> {
    pub fn new(doc: &'a Document, options: &'a ImportOptions) -> Self {
        Self {
            doc,
            options,
            resolver: StyleResolver::new(doc),
            block_cache: HashMap::new(),
            expanding: HashSet::new(),
            stats: ImportStats::default(),
        }
    }

    #[inline]
    fn curve_tolerance(&self) -> f64 {
        self.options.tessellation.curve_tolerance_deg
    }

    #[inline]
    fn block_circle_tolerance(&self) -> f64 {
        self.options.tessellation.block_circle_tolerance_deg
    }

    /// 遍历模型空间实体（可选包含图纸空间），结果已乘以 `root` 变换。
    pub fn convert_document(&mut self, root: &Mat2D) -> Vec<DraftShape> {
        let doc = self.doc;
        let mut drafts = Vec::new();
        self.stats.entities_total = doc.entities.len();
        for entity in &doc.entities {
            if entity.common().paper_space && !self.options.include_paper_space {
                self.stats.entities_skipped += 1;
                continue;
            }
            let before = drafts.len();
            self.expand_entity(entity, root, &mut drafts);
            if drafts.len() > before {
                self.stats.entities_converted += 1;
            } else {
                self.stats.entities_skipped += 1;
                debug!(kind = entity.kind(), layer = entity.layer_name(), "实体未产生形状");
            }
        }
        drafts
    }

    fn expand(&mut self, entities: &'a [Entity], parent: &Mat2D, out: &mut Vec<DraftShape>) {
        for entity in entities {
            self.expand_entity(entity, parent, out);
        }
    }

    fn expand_entity(&mut self, entity: &'a Entity, parent: &Mat2D, out: &mut Vec<DraftShape>) {
        match entity {
            Entity::Insert(insert) => self.expand_insert(insert, parent, out),
            other => {
                let tolerance = self.block_circle_tolerance();
                if let Some(draft) = self.convert_entity(other) {
                    out.push(draft.transformed(parent, tolerance));
                }
            }
        }
    }

    fn expand_insert(&mut self, insert: &'a Insert, parent: &Mat2D, out: &mut Vec<DraftShape>) {
        let doc = self.doc;
        let tolerance = self.block_circle_tolerance();

        if let Some(children) = self.block_shapes(&insert.name) {
            let base_point = doc
                .block(&insert.name)
                .map(|block| block.base_point)
                .unwrap_or(Point2::ORIGIN);
            let parent_scale = parent.determinant().abs().sqrt();
            let inherited = InheritedStyle {
                color: self.resolver.resolve_color(&insert.common),
                line_weight: self.resolver.resolve_line_weight(&insert.common),
                dash: self
                    .resolver
                    .resolve_dash(&insert.common)
                    .map(|pattern| pattern.iter().map(|length| length * parent_scale).collect()),
            };
            for local in insert_placements(insert, base_point) {
                self.stats.block_instances += 1;
                let placement = Mat2D::multiply(parent, &local);
                out.extend(
                    children
                        .iter()
                        .map(|child| child.transformed(&placement, tolerance).inherit_from(&inherited)),
                );
            }
        }

        // ATTRIB 已在块参照所在坐标系中。
        for attribute in &insert.attributes {
            let draft = self.draft(
                &attribute.common,
                ShapeGeometry::Text(self.text_shape(attribute)),
            );
            out.push(draft.transformed(parent, tolerance));
        }
    }

    /// 块定义坐标系下的子形状，每个块名只展开一次。
    fn block_shapes(&mut self, name: &str) -> Option<Rc<Vec<DraftShape>>> {
        if let Some(cached) = self.block_cache.get(name) {
            return Some(Rc::clone(cached));
        }
        if self.expanding.contains(name) {
            self.stats.cyclic_references += 1;
            warn!(block = name, "检测到块的循环引用，已跳过");
            return None;
        }
        let doc = self.doc;
        let Some(block) = doc.block(name) else {
            self.stats.missing_blocks += 1;
            warn!(block = name, "块参照引用了不存在的块定义");
            return None;
        };

        self.expanding.insert(name.to_string());
        let mut children = Vec::new();
        self.expand(&block.entities, &Mat2D::identity(), &mut children);
        self.expanding.remove(name);

        self.stats.block_expansions += 1;
        debug!(block = name, shapes = children.len(), "已展开块定义");
        let children = Rc::new(children);
        self.block_cache.insert(name.to_string(), Rc::clone(&children));
        Some(children)
    }

    fn draft(&self, common: &EntityCommon, geometry: ShapeGeometry) -> DraftShape {
        DraftShape {
            layer: common.layer.clone(),
            color: self.resolver.resolve_color(common),
            line_weight: self.resolver.resolve_line_weight(common),
            dash: self.resolver.resolve_dash(common),
            geometry,
        }
    }

    /// 单个非块参照实体转换为实体坐标系下的中间形状。
    fn convert_entity(&self, entity: &Entity) -> Option<DraftShape> {
        let geometry = match entity {
            Entity::Line(line) => ShapeGeometry::Line {
                start: line.start,
                end: line.end,
            },
            Entity::Polyline(polyline) => self.polyline_geometry(polyline),
            Entity::Spline(spline) => self.spline_geometry(spline),
            Entity::Circle(circle) => ShapeGeometry::Circle {
                center: circle.center,
                radius: circle.radius,
            },
            Entity::Arc(arc) => self.arc_geometry(arc),
            Entity::Text(text) => ShapeGeometry::Text(self.text_shape(text)),
            Entity::MText(mtext) => ShapeGeometry::Text(self.mtext_shape(mtext)),
            Entity::Insert(_) => return None,
        };
        Some(self.draft(entity.common(), geometry))
    }

    fn polyline_geometry(&self, polyline: &Polyline) -> ShapeGeometry {
        let points = polyline_points(&polyline.vertices, polyline.closed, self.curve_tolerance());
        if polyline.closed {
            ShapeGeometry::Polygon { points }
        } else {
            ShapeGeometry::Polyline { points }
        }
    }

    fn spline_geometry(&self, spline: &Spline) -> ShapeGeometry {
        let points = spline_points(spline, self.options.tessellation.spline_resolution);
        if spline.closed {
            ShapeGeometry::Polygon { points }
        } else {
            ShapeGeometry::Polyline { points }
        }
    }

    fn arc_geometry(&self, arc: &Arc) -> ShapeGeometry {
        ShapeGeometry::Polyline {
            points: tessellate_arc(
                arc.center,
                arc.radius,
                arc.start_angle,
                arc.end_angle,
                true,
                self.curve_tolerance(),
            ),
        }
    }

    #[inline]
    fn text_shape(&self, text: &Text) -> TextShape {
        text_shape(self.doc, text)
    }

    #[inline]
    fn mtext_shape(&self, mtext: &MText) -> TextShape {
        mtext_shape(self.doc, mtext)
    }

    /// 图层记录：先按图层表顺序，再补上被引用但未定义的图层。
    pub fn layer_records<'n>(
        &self,
        referenced: impl IntoIterator<Item = &'n str>,
    ) -> (Vec<LayerRecord>, HashMap<String, String>) {
        let mut names: Vec<String> = self.doc.layers().map(|layer| layer.name.clone()).collect();
        let mut known: HashSet<String> = names.iter().cloned().collect();
        for name in referenced {
            if known.insert(name.to_string()) {
                names.push(name.to_string());
            }
        }

        let mut used = HashSet::new();
        let mut records = Vec::with_capacity(names.len());
        let mut ids = HashMap::with_capacity(names.len());
        for name in names {
            let id = match self.options.default_layer_id.as_deref() {
                Some(host_id) if name == DEFAULT_LAYER_NAME => {
                    used.insert(host_id.to_string());
                    host_id.to_string()
                }
                _ => unique_id(format!("dxf-layer-{}", sanitize_id(&name)), &mut used),
            };
            let visible = self
                .doc
                .layer(&name)
                .map(|def| def.is_displayed())
                .unwrap_or(true);
            let color = apply_color_scheme(
                self.options.color_scheme,
                self.options.custom_color.as_deref(),
                &self.resolver.layer_color(&name),
            );
            ids.insert(name.clone(), id.clone());
            records.push(LayerRecord {
                id,
                name,
                color,
                visible,
                locked: self.options.read_only,
            });
        }
        (records, ids)
    }

    /// 随块属性落到默认值，应用配色方案，并清理退化形状。
    pub fn finalize(
        &mut self,
        drafts: Vec<DraftShape>,
        layer_ids: &HashMap<String, String>,
    ) -> Vec<ShapeRecord> {
        let default_weight = self.resolver.default_line_weight_mm();
        let mut shapes = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if draft.geometry.is_degenerate() {
                self.stats.shapes_dropped += 1;
                continue;
            }
            let color = apply_color_scheme(
                self.options.color_scheme,
                self.options.custom_color.as_deref(),
                &draft.color.resolve_or(DEFAULT_COLOR.to_string()),
            );
            let is_text = matches!(draft.geometry, ShapeGeometry::Text(_));
            let layer_id = layer_ids
                .get(&draft.layer)
                .cloned()
                .unwrap_or_else(|| format!("dxf-layer-{}", sanitize_id(&draft.layer)));
            shapes.push(ShapeRecord {
                id: format!("dxf-shape-{}", shapes.len() + 1),
                layer_id,
                floor_id: self.options.floor_id.clone(),
                fill_color: is_text.then(|| color.clone()),
                stroke_color: color,
                stroke_width: draft.line_weight.resolve_or(default_weight) * MM_TO_OUTPUT,
                stroke_dash: draft.dash.resolve_or(Vec::new()),
                geometry: draft.geometry,
            });
        }
        if self.stats.shapes_dropped > 0 {
            debug!(dropped = self.stats.shapes_dropped, "已清理退化形状");
        }
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;
    use crate::style::Inheritable;
    use zcad_core::document::{BlockDefinition, Circle, Line};

    fn circle_entity(layer: &str, color_index: i16, radius: f64) -> Entity {
        Entity::Circle(Circle {
            common: EntityCommon::on_layer(layer).with_color_index(color_index),
            center: Point2::new(0.0, 0.0),
            radius,
        })
    }

    #[test]
    fn sanitized_ids_are_unique() {
        let mut used = HashSet::new();
        assert_eq!(sanitize_id("A B/C"), "A_B_C");
        assert_eq!(sanitize_id(""), "_");
        assert_eq!(unique_id("x".into(), &mut used), "x");
        assert_eq!(unique_id("x".into(), &mut used), "x-2");
        assert_eq!(unique_id("x".into(), &mut used), "x-3");
    }

    #[test]
    fn closed_bulged_polyline_has_interior_points() {
        let vertices = [
            PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
            PolylineVertex::with_bulge(Point2::new(2.0, 0.0), 1.0),
        ];
        let points = polyline_points(&vertices, true, 10.0);
        assert!(points.len() > 4);
        for point in &points {
            assert!((point.distance(Point2::new(1.0, 0.0)) - 1.0).abs() < 1e-9);
        }
        let open = polyline_points(&vertices[..1], false, 10.0);
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn insert_placement_applies_scale_rotation_and_base_point() {
        let insert = Insert::new("B", Point2::new(10.0, 0.0))
            .with_scale(2.0, 2.0)
            .with_rotation(FRAC_PI_2);
        let placements = insert_placements(&insert, Point2::new(1.0, 0.0));
        assert_eq!(placements.len(), 1);
        let mapped = placements[0].apply_to_point(Point2::new(2.0, 0.0));
        assert!(mapped.approx_eq(Point2::new(10.0, 2.0), 1e-9));
    }

    #[test]
    fn text_alignment_codes() {
        assert_eq!(text_alignment(0, 0), (TextAlign::Left, TextBaseline::Alphabetic));
        assert_eq!(text_alignment(4, 0), (TextAlign::Center, TextBaseline::Middle));
        assert_eq!(text_alignment(2, 3), (TextAlign::Right, TextBaseline::Top));
        assert_eq!(attachment_alignment(5), (TextAlign::Center, TextBaseline::Middle));
        assert_eq!(attachment_alignment(9), (TextAlign::Right, TextBaseline::Bottom));
        assert_eq!(attachment_alignment(0), (TextAlign::Left, TextBaseline::Top));
    }

    #[test]
    fn non_similar_block_circle_becomes_polygon() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("HOLE", Point2::ORIGIN);
        block.entities.push(circle_entity("0", 0, 1.0));
        doc.add_block_definition(block);
        doc.add_entity(Entity::Insert(
            Insert::new("HOLE", Point2::new(5.0, 5.0))
                .with_scale(2.0, 1.0)
                .with_common(EntityCommon::on_layer("0").with_color_index(1)),
        ));
        doc.add_entity(Entity::Insert(
            Insert::new("HOLE", Point2::new(0.0, 0.0)).with_scale(3.0, 3.0),
        ));

        let options = ImportOptions::default();
        let mut context = ConversionContext::new(&doc, &options);
        let drafts = context.convert_document(&Mat2D::identity());
        assert_eq!(drafts.len(), 2);
        assert_eq!(context.stats.block_expansions, 1);
        assert_eq!(context.stats.block_instances, 2);

        match &drafts[0].geometry {
            ShapeGeometry::Polygon { points } => {
                // 1° 容差下整圆为 360 段。
                assert!(points.len() >= 360);
                for point in points {
                    let local = Point2::new((point.x() - 5.0) / 2.0, point.y() - 5.0);
                    assert!((local.distance(Point2::ORIGIN) - 1.0).abs() < 1e-9);
                }
            }
            other => panic!("期望多边形，实际 {}", other.kind()),
        }
        assert_eq!(drafts[0].color, Inheritable::Resolved("#FF0000".to_string()));

        match &drafts[1].geometry {
            ShapeGeometry::Circle { radius, .. } => assert!((radius - 3.0).abs() < 1e-9),
            other => panic!("期望圆，实际 {}", other.kind()),
        }
        // 第二个块参照随层，图层 0 为 ACI 7。
        assert_eq!(drafts[1].color, Inheritable::Resolved("#000000".to_string()));
    }

    #[test]
    fn mirrored_insert_flips_text_vertical_scale() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("LABEL", Point2::ORIGIN);
        block.entities.push(Entity::Text(Text {
            common: EntityCommon::on_layer("0"),
            insert: Point2::new(1.0, 0.0),
            alignment_point: None,
            height: 2.0,
            rotation: 0.0,
            width_factor: 1.0,
            horizontal_alignment: 0,
            vertical_alignment: 0,
            style: None,
            content: "A".to_string(),
        }));
        doc.add_block_definition(block);
        doc.add_entity(Entity::Insert(
            Insert::new("LABEL", Point2::ORIGIN).with_scale(-1.0, 1.0),
        ));

        let options = ImportOptions::default();
        let mut context = ConversionContext::new(&doc, &options);
        let drafts = context.convert_document(&Mat2D::identity());
        match &drafts[0].geometry {
            ShapeGeometry::Text(text) => {
                assert!(text.position.approx_eq(Point2::new(-1.0, 0.0), 1e-12));
                assert!((text.rotation.abs() - std::f64::consts::PI).abs() < 1e-12);
                assert!((text.scale_x - 1.0).abs() < 1e-12);
                assert!((text.scale_y + 1.0).abs() < 1e-12);
            }
            other => panic!("期望文字，实际 {}", other.kind()),
        }
    }

    #[test]
    fn by_block_line_weight_and_dash_follow_insert() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("B", Point2::ORIGIN);
        block.entities.push(Entity::Line(Line {
            common: EntityCommon::on_layer("0")
                .with_line_weight(-2)
                .with_line_type("BYBLOCK"),
            start: Point2::new(0.0, 0.0),
            end: Point2::new(1.0, 0.0),
        }));
        doc.add_block_definition(block);
        doc.add_entity(Entity::Insert(
            Insert::new("B", Point2::ORIGIN).with_common(
                EntityCommon::on_layer("0")
                    .with_line_weight(50)
                    .with_line_type("DASHED"),
            ),
        ));

        let options = ImportOptions::default();
        let mut context = ConversionContext::new(&doc, &options);
        let drafts = context.convert_document(&Mat2D::from_scaling(10.0, 10.0));
        assert_eq!(drafts[0].line_weight, Inheritable::Resolved(0.5));
        assert_eq!(drafts[0].dash, Inheritable::Resolved(vec![5.0, 2.5]));
    }
}
