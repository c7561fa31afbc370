//! 导入所用的图纸数据模型。
//!
//! 结构与外部 DXF 解析器的输出一一对应：`header`、`tables.layer.layers`、
//! `tables.style.styles`、`tables.ltype.linetypes`、`blocks` 与 `entities`。
//! 模型内所有角度均为弧度。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::geometry::{Point2, Vector2};

/// 默认图层名。
pub const DEFAULT_LAYER: &str = "0";

const COLOR_BY_BLOCK: i16 = 0;
const COLOR_BY_LAYER: i16 = 256;

const LINE_WEIGHT_BY_LAYER: i16 = -1;
const LINE_WEIGHT_BY_BLOCK: i16 = -2;
const LINE_WEIGHT_DEFAULT: i16 = -3;

fn default_layer() -> String {
    DEFAULT_LAYER.to_string()
}

fn default_one() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

fn default_unit_scale() -> Vector2 {
    Vector2::new(1.0, 1.0)
}

fn default_count() -> u32 {
    1
}

fn default_degree() -> usize {
    3
}

/// 文档头变量（`$INSUNITS` 等）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "$INSUNITS", alias = "insunits", default)]
    pub insunits: Option<i16>,
    #[serde(rename = "$EXTMIN", alias = "extmin", default)]
    pub extmin: Option<Point2>,
    #[serde(rename = "$EXTMAX", alias = "extmax", default)]
    pub extmax: Option<Point2>,
    #[serde(rename = "$LTSCALE", alias = "ltscale", default = "default_one")]
    pub ltscale: f64,
    #[serde(rename = "$TEXTSIZE", alias = "textsize", default = "Header::default_text_size")]
    pub text_size: f64,
    /// 默认线宽，单位为 0.01 mm。
    #[serde(rename = "$LWDEFAULT", alias = "lwdefault", default = "Header::default_line_weight")]
    pub default_line_weight: i16,
}

impl Header {
    fn default_text_size() -> f64 {
        2.5
    }

    fn default_line_weight() -> i16 {
        25
    }

    /// 仅当 `$EXTMIN`/`$EXTMAX` 均存在且构成有效范围时返回范围尺寸。
    pub fn extents_size(&self) -> Option<(f64, f64)> {
        let (min, max) = (self.extmin?, self.extmax?);
        let width = max.x() - min.x();
        let height = max.y() - min.y();
        // 未保存范围的图纸通常写入 ±1e20 哨兵值。
        let valid = min.is_finite()
            && max.is_finite()
            && width >= 0.0
            && height >= 0.0
            && width.max(height) < 1e19;
        if valid { Some((width, height)) } else { None }
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            insunits: None,
            extmin: None,
            extmax: None,
            ltscale: 1.0,
            text_size: Self::default_text_size(),
            default_line_weight: Self::default_line_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDef {
    pub name: String,
    #[serde(default = "LayerDef::default_color")]
    pub color_index: i16,
    #[serde(default)]
    pub true_color: Option<u32>,
    #[serde(default)]
    pub line_type: Option<String>,
    #[serde(default)]
    pub line_weight: Option<i16>,
    #[serde(default)]
    pub frozen: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
}

impl LayerDef {
    fn default_color() -> i16 {
        7
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color_index: Self::default_color(),
            true_color: None,
            line_type: None,
            line_weight: None,
            frozen: false,
            visible: true,
        }
    }

    pub fn with_color(mut self, color_index: i16) -> Self {
        self.color_index = color_index;
        self
    }

    pub fn with_line_type(mut self, line_type: impl Into<String>) -> Self {
        self.line_type = Some(line_type.into());
        self
    }

    /// 图层可见且未冻结。
    #[inline]
    pub fn is_displayed(&self) -> bool {
        self.visible && !self.frozen
    }
}

/// 文字样式表条目。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextStyle {
    pub name: String,
    /// 固定字高，0 表示不固定。
    #[serde(default)]
    pub fixed_height: f64,
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default = "default_one")]
    pub width_factor: f64,
}

/// 线型定义：正数为实线段，0 为点，负数为空白段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineTypeDef {
    pub name: String,
    #[serde(default)]
    pub pattern: Vec<f64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LayerTable {
    #[serde(default)]
    pub layers: IndexMap<String, LayerDef>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StyleTable {
    #[serde(default)]
    pub styles: IndexMap<String, TextStyle>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LineTypeTable {
    #[serde(default)]
    pub linetypes: IndexMap<String, LineTypeDef>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    pub layer: LayerTable,
    #[serde(default)]
    pub style: StyleTable,
    #[serde(default)]
    pub ltype: LineTypeTable,
}

/// 实体颜色的解析形式，按优先级排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpec {
    TrueColor(u32),
    Index(u8),
    ByBlock,
    ByLayer,
}

impl ColorSpec {
    /// 按 ACI 语义解释颜色号：0 随块、256 随层、负值表示图层关闭取绝对值。
    pub fn from_index(index: i16) -> Self {
        match index {
            COLOR_BY_BLOCK => ColorSpec::ByBlock,
            COLOR_BY_LAYER => ColorSpec::ByLayer,
            1..=255 => ColorSpec::Index(index as u8),
            _ if index < 0 => ColorSpec::Index(index.unsigned_abs().min(255) as u8),
            _ => ColorSpec::ByLayer,
        }
    }
}

/// 线宽的解析形式，数值单位为 0.01 mm。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWeightSpec {
    Value(i16),
    ByLayer,
    ByBlock,
    Default,
}

impl LineWeightSpec {
    pub fn from_raw(raw: i16) -> Self {
        match raw {
            LINE_WEIGHT_BY_LAYER => LineWeightSpec::ByLayer,
            LINE_WEIGHT_BY_BLOCK => LineWeightSpec::ByBlock,
            LINE_WEIGHT_DEFAULT => LineWeightSpec::Default,
            value if value >= 0 => LineWeightSpec::Value(value),
            _ => LineWeightSpec::Default,
        }
    }
}

/// 所有实体共享的属性。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityCommon {
    #[serde(default = "default_layer")]
    pub layer: String,
    #[serde(default)]
    pub color_index: Option<i16>,
    #[serde(default)]
    pub true_color: Option<u32>,
    #[serde(default)]
    pub line_type: Option<String>,
    #[serde(default)]
    pub line_type_scale: Option<f64>,
    #[serde(default)]
    pub line_weight: Option<i16>,
    #[serde(default)]
    pub paper_space: bool,
}

impl Default for EntityCommon {
    fn default() -> Self {
        Self::on_layer(DEFAULT_LAYER)
    }
}

impl EntityCommon {
    pub fn on_layer(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            color_index: None,
            true_color: None,
            line_type: None,
            line_type_scale: None,
            line_weight: None,
            paper_space: false,
        }
    }

    pub fn with_color_index(mut self, index: i16) -> Self {
        self.color_index = Some(index);
        self
    }

    pub fn with_true_color(mut self, rgb: u32) -> Self {
        self.true_color = Some(rgb);
        self
    }

    pub fn with_line_type(mut self, name: impl Into<String>) -> Self {
        self.line_type = Some(name.into());
        self
    }

    pub fn with_line_weight(mut self, weight: i16) -> Self {
        self.line_weight = Some(weight);
        self
    }

    pub fn in_paper_space(mut self) -> Self {
        self.paper_space = true;
        self
    }

    /// 显式真彩色优先于颜色号，均缺省时随层。
    pub fn color(&self) -> ColorSpec {
        if let Some(rgb) = self.true_color {
            return ColorSpec::TrueColor(rgb & 0x00FF_FFFF);
        }
        self.color_index
            .map(ColorSpec::from_index)
            .unwrap_or(ColorSpec::ByLayer)
    }

    pub fn line_weight(&self) -> LineWeightSpec {
        self.line_weight
            .map(LineWeightSpec::from_raw)
            .unwrap_or(LineWeightSpec::ByLayer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub start: Point2,
    pub end: Point2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub position: Point2,
    #[serde(default)]
    pub bulge: f64,
}

impl PolylineVertex {
    #[inline]
    pub fn new(position: Point2) -> Self {
        Self {
            position,
            bulge: 0.0,
        }
    }

    #[inline]
    pub fn with_bulge(position: Point2, bulge: f64) -> Self {
        Self { position, bulge }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Polyline {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub vertices: Vec<PolylineVertex>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spline {
    #[serde(flatten)]
    pub common: EntityCommon,
    #[serde(default = "default_degree")]
    pub degree: usize,
    #[serde(default)]
    pub control_points: Vec<Point2>,
    #[serde(default)]
    pub fit_points: Vec<Point2>,
    #[serde(default)]
    pub knots: Vec<f64>,
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub closed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circle {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub center: Point2,
    pub radius: f64,
}

/// 圆弧实体，角度为弧度，按逆时针从起始角扫到终止角。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arc {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

/// TEXT / ATTRIB 的对齐码（组码 72/73）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub insert: Point2,
    #[serde(default)]
    pub alignment_point: Option<Point2>,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_one")]
    pub width_factor: f64,
    #[serde(default)]
    pub horizontal_alignment: i16,
    #[serde(default)]
    pub vertical_alignment: i16,
    #[serde(default)]
    pub style: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MText {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub insert: Point2,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
    /// 1-9：左上、中上、右上、左中、正中、右中、左下、中下、右下。
    #[serde(default = "MText::default_attachment")]
    pub attachment_point: i16,
    #[serde(default)]
    pub style: Option<String>,
    pub content: String,
}

impl MText {
    fn default_attachment() -> i16 {
        1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insert {
    #[serde(flatten)]
    pub common: EntityCommon,
    pub name: String,
    pub insert: Point2,
    #[serde(default = "default_unit_scale")]
    pub scale: Vector2,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_count")]
    pub column_count: u32,
    #[serde(default = "default_count")]
    pub row_count: u32,
    #[serde(default)]
    pub column_spacing: f64,
    #[serde(default)]
    pub row_spacing: f64,
    #[serde(default)]
    pub attributes: Vec<Text>,
}

impl Insert {
    pub fn new(name: impl Into<String>, insert: Point2) -> Self {
        Self {
            common: EntityCommon::default(),
            name: name.into(),
            insert,
            scale: default_unit_scale(),
            rotation: 0.0,
            column_count: 1,
            row_count: 1,
            column_spacing: 0.0,
            row_spacing: 0.0,
            attributes: Vec::new(),
        }
    }

    pub fn with_scale(mut self, sx: f64, sy: f64) -> Self {
        self.scale = Vector2::new(sx, sy);
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_common(mut self, common: EntityCommon) -> Self {
        self.common = common;
        self
    }

    /// 阵列单元总数，乘积溢出时返回 `None`。
    pub fn cell_count(&self) -> Option<usize> {
        let columns = usize::try_from(self.column_count.max(1)).ok()?;
        let rows = usize::try_from(self.row_count.max(1)).ok()?;
        columns.checked_mul(rows)
    }

    /// 阵列插入的每个单元在插入坐标系（未旋转）下的偏移。单元数超过 `limit` 时返回 `None`。
    pub fn array_offsets(&self, limit: usize) -> Option<Vec<Vector2>> {
        let cells = self.cell_count().filter(|cells| *cells <= limit)?;
        let columns = self.column_count.max(1);
        let rows = self.row_count.max(1);
        let mut offsets = Vec::with_capacity(cells);
        for row in 0..rows {
            for column in 0..columns {
                offsets.push(Vector2::new(
                    column as f64 * self.column_spacing,
                    row as f64 * self.row_spacing,
                ));
            }
        }
        Some(offsets)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Entity {
    #[serde(rename = "LINE")]
    Line(Line),
    #[serde(rename = "LWPOLYLINE", alias = "POLYLINE")]
    Polyline(Polyline),
    #[serde(rename = "SPLINE")]
    Spline(Spline),
    #[serde(rename = "CIRCLE")]
    Circle(Circle),
    #[serde(rename = "ARC")]
    Arc(Arc),
    #[serde(rename = "TEXT")]
    Text(Text),
    #[serde(rename = "MTEXT")]
    MText(MText),
    #[serde(rename = "INSERT")]
    Insert(Insert),
}

impl Entity {
    #[inline]
    pub fn common(&self) -> &EntityCommon {
        match self {
            Entity::Line(line) => &line.common,
            Entity::Polyline(polyline) => &polyline.common,
            Entity::Spline(spline) => &spline.common,
            Entity::Circle(circle) => &circle.common,
            Entity::Arc(arc) => &arc.common,
            Entity::Text(text) => &text.common,
            Entity::MText(mtext) => &mtext.common,
            Entity::Insert(insert) => &insert.common,
        }
    }

    #[inline]
    pub fn layer_name(&self) -> &str {
        &self.common().layer
    }

    /// DXF 实体类型名，用于日志。
    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Line(_) => "LINE",
            Entity::Polyline(_) => "LWPOLYLINE",
            Entity::Spline(_) => "SPLINE",
            Entity::Circle(_) => "CIRCLE",
            Entity::Arc(_) => "ARC",
            Entity::Text(_) => "TEXT",
            Entity::MText(_) => "MTEXT",
            Entity::Insert(_) => "INSERT",
        }
    }

    /// 实体定义坐标中的代表点，供单位推断采样。
    pub fn sample_points(&self) -> Vec<Point2> {
        match self {
            Entity::Line(line) => vec![line.start, line.end],
            Entity::Polyline(polyline) => {
                polyline.vertices.iter().map(|vertex| vertex.position).collect()
            }
            Entity::Spline(spline) => spline
                .control_points
                .iter()
                .chain(spline.fit_points.iter())
                .copied()
                .collect(),
            Entity::Circle(circle) => vec![
                circle.center.translate(Vector2::new(-circle.radius, -circle.radius)),
                circle.center.translate(Vector2::new(circle.radius, circle.radius)),
            ],
            Entity::Arc(arc) => vec![
                arc.center.translate(Vector2::new(-arc.radius, -arc.radius)),
                arc.center.translate(Vector2::new(arc.radius, arc.radius)),
            ],
            Entity::Text(text) => vec![text.insert],
            Entity::MText(mtext) => vec![mtext.insert],
            Entity::Insert(insert) => vec![insert.insert],
        }
    }
}

/// 块定义。子实体可能（在损坏的文件中）直接或间接引用自身。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub name: String,
    #[serde(default = "BlockDefinition::origin")]
    pub base_point: Point2,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl BlockDefinition {
    fn origin() -> Point2 {
        Point2::ORIGIN
    }

    pub fn new(name: impl Into<String>, base_point: Point2) -> Self {
        Self {
            name: name.into(),
            base_point,
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub header: Header,
    #[serde(default)]
    pub tables: Tables,
    #[serde(default)]
    pub blocks: IndexMap<String, BlockDefinition>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self::default();
        doc.ensure_layer(DEFAULT_LAYER);
        doc
    }

    pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
        let key = name.as_ref();
        self.tables
            .layer
            .layers
            .entry(key.to_string())
            .or_insert_with(|| LayerDef::new(key));
    }

    pub fn add_layer(&mut self, layer: LayerDef) {
        self.tables.layer.layers.insert(layer.name.clone(), layer);
    }

    pub fn add_text_style(&mut self, style: TextStyle) {
        self.tables.style.styles.insert(style.name.clone(), style);
    }

    pub fn add_line_type(&mut self, line_type: LineTypeDef) {
        self.tables
            .ltype
            .linetypes
            .insert(line_type.name.clone(), line_type);
    }

    pub fn add_block_definition(&mut self, definition: BlockDefinition) {
        self.blocks.insert(definition.name.clone(), definition);
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.ensure_layer(entity.layer_name().to_string());
        self.entities.push(entity);
    }

    pub fn add_line(&mut self, start: Point2, end: Point2, layer: impl Into<String>) {
        self.add_entity(Entity::Line(Line {
            common: EntityCommon::on_layer(layer),
            start,
            end,
        }));
    }

    pub fn add_circle(&mut self, center: Point2, radius: f64, layer: impl Into<String>) {
        self.add_entity(Entity::Circle(Circle {
            common: EntityCommon::on_layer(layer),
            center,
            radius,
        }));
    }

    pub fn add_arc(
        &mut self,
        center: Point2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        layer: impl Into<String>,
    ) {
        self.add_entity(Entity::Arc(Arc {
            common: EntityCommon::on_layer(layer),
            center,
            radius,
            start_angle,
            end_angle,
        }));
    }

    pub fn add_polyline<I>(&mut self, vertices: I, closed: bool, layer: impl Into<String>)
    where
        I: IntoIterator<Item = PolylineVertex>,
    {
        self.add_entity(Entity::Polyline(Polyline {
            common: EntityCommon::on_layer(layer),
            vertices: vertices.into_iter().collect(),
            closed,
        }));
    }

    #[inline]
    pub fn layer(&self, name: &str) -> Option<&LayerDef> {
        self.tables.layer.layers.get(name)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerDef> {
        self.tables.layer.layers.values()
    }

    #[inline]
    pub fn text_style(&self, name: &str) -> Option<&TextStyle> {
        self.tables.style.styles.get(name)
    }

    /// 线型名大小写不敏感。
    pub fn line_type(&self, name: &str) -> Option<&LineTypeDef> {
        self.tables.ltype.linetypes.get(name).or_else(|| {
            self.tables
                .ltype
                .linetypes
                .values()
                .find(|def| def.name.eq_ignore_ascii_case(name))
        })
    }

    #[inline]
    pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_deserializes_from_parser_json() {
        let json = r#"{
            "header": { "$INSUNITS": 4, "$LTSCALE": 2.0 },
            "tables": {
                "layer": { "layers": {
                    "WALLS": { "name": "WALLS", "color_index": 1, "line_type": "DASHED" }
                } },
                "ltype": { "linetypes": {
                    "DASHED": { "name": "DASHED", "pattern": [0.5, -0.25] }
                } }
            },
            "blocks": {
                "DOOR": {
                    "name": "DOOR",
                    "base_point": [1.0, 2.0],
                    "entities": [
                        { "type": "CIRCLE", "layer": "0", "color_index": 0, "center": [0, 0], "radius": 1 }
                    ]
                }
            },
            "entities": [
                { "type": "LINE", "layer": "WALLS", "start": [0, 0], "end": [10, 0] },
                { "type": "POLYLINE", "vertices": [ { "position": [0, 0], "bulge": 1.0 }, { "position": [2, 0] } ], "closed": true },
                { "type": "INSERT", "name": "DOOR", "insert": [5, 5], "rotation": 1.5707963267948966 }
            ]
        }"#;

        let doc: Document = serde_json::from_str(json).expect("解析 JSON 文档失败");
        assert_eq!(doc.header.insunits, Some(4));
        assert!((doc.header.ltscale - 2.0).abs() < 1e-12);
        assert!((doc.header.text_size - 2.5).abs() < 1e-12);
        assert_eq!(doc.header.default_line_weight, 25);

        let walls = doc.layer("WALLS").expect("缺少 WALLS 图层");
        assert_eq!(walls.color_index, 1);
        assert!(walls.visible);
        assert!(!walls.frozen);

        let block = doc.block("DOOR").expect("缺少 DOOR 块");
        assert_eq!(block.base_point, Point2::new(1.0, 2.0));
        assert_eq!(block.entities.len(), 1);
        assert_eq!(block.entities[0].common().color(), ColorSpec::ByBlock);

        assert_eq!(doc.entities.len(), 3);
        assert_eq!(doc.entities[0].kind(), "LINE");
        assert_eq!(doc.entities[0].layer_name(), "WALLS");
        match &doc.entities[1] {
            Entity::Polyline(polyline) => {
                assert!(polyline.closed);
                assert_eq!(polyline.vertices.len(), 2);
                assert_eq!(polyline.common.layer, DEFAULT_LAYER);
                assert!((polyline.vertices[0].bulge - 1.0).abs() < 1e-12);
                assert_eq!(polyline.vertices[1].bulge, 0.0);
            }
            other => panic!("期望多段线，实际为 {}", other.kind()),
        }
        match &doc.entities[2] {
            Entity::Insert(insert) => {
                assert_eq!(insert.scale, Vector2::new(1.0, 1.0));
                assert_eq!(insert.column_count, 1);
                assert_eq!(insert.array_offsets(1).map(|offsets| offsets.len()), Some(1));
            }
            other => panic!("期望块参照，实际为 {}", other.kind()),
        }
    }

    #[test]
    fn color_spec_follows_aci_semantics() {
        assert_eq!(ColorSpec::from_index(0), ColorSpec::ByBlock);
        assert_eq!(ColorSpec::from_index(256), ColorSpec::ByLayer);
        assert_eq!(ColorSpec::from_index(5), ColorSpec::Index(5));
        assert_eq!(ColorSpec::from_index(-3), ColorSpec::Index(3));

        let common = EntityCommon::on_layer("A")
            .with_color_index(1)
            .with_true_color(0x12_34_56);
        assert_eq!(common.color(), ColorSpec::TrueColor(0x12_34_56));
        assert_eq!(EntityCommon::default().color(), ColorSpec::ByLayer);
    }

    #[test]
    fn line_weight_spec_decodes_sentinels() {
        assert_eq!(LineWeightSpec::from_raw(-1), LineWeightSpec::ByLayer);
        assert_eq!(LineWeightSpec::from_raw(-2), LineWeightSpec::ByBlock);
        assert_eq!(LineWeightSpec::from_raw(-3), LineWeightSpec::Default);
        assert_eq!(LineWeightSpec::from_raw(35), LineWeightSpec::Value(35));
        assert_eq!(EntityCommon::default().line_weight(), LineWeightSpec::ByLayer);
    }

    #[test]
    fn header_extents_reject_sentinel_values() {
        let mut header = Header::default();
        assert!(header.extents_size().is_none());

        header.extmin = Some(Point2::new(1e20, 1e20));
        header.extmax = Some(Point2::new(-1e20, -1e20));
        assert!(header.extents_size().is_none());

        header.extmin = Some(Point2::new(0.0, 0.0));
        header.extmax = Some(Point2::new(30.0, 12.0));
        assert_eq!(header.extents_size(), Some((30.0, 12.0)));
    }

    #[test]
    fn array_offsets_cover_every_cell() {
        let mut insert = Insert::new("GRID", Point2::new(0.0, 0.0));
        insert.column_count = 3;
        insert.row_count = 2;
        insert.column_spacing = 10.0;
        insert.row_spacing = 5.0;
        let offsets = insert.array_offsets(100).expect("6 个单元未超过上限");
        assert_eq!(offsets.len(), 6);
        assert_eq!(offsets[5], Vector2::new(20.0, 5.0));
        assert!(insert.array_offsets(5).is_none());
    }

    #[test]
    fn huge_arrays_are_counted_without_overflow() {
        let mut insert = Insert::new("GRID", Point2::new(0.0, 0.0));
        insert.column_count = u32::MAX;
        insert.row_count = u32::MAX;
        let expected = usize::try_from(u32::MAX)
            .ok()
            .and_then(|side| side.checked_mul(side));
        assert_eq!(insert.cell_count(), expected);
        assert!(insert.array_offsets(30_000).is_none());

        insert.column_count = 0;
        insert.row_count = 0;
        assert_eq!(insert.cell_count(), Some(1));
    }
}
