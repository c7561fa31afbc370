mod convert;
pub mod normalize;
pub mod shapes;
pub mod style;
pub mod svg;
pub mod text;
pub mod units;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum ImportError {
        #[error("图纸包含 {count} 个实体，超过上限 {limit}")]
        TooManyEntities { count: usize, limit: usize },
        #[error("块 {block} 的阵列插入包含 {cells} 个单元，超过上限 {limit}")]
        ArrayTooLarge {
            block: String,
            /// 单元数溢出时为 `usize::MAX`。
            cells: usize,
            limit: usize,
        },
    }
}

use tracing::{debug, info};
use zcad_config::ImportOptions;
use zcad_core::document::{Document, Entity};
use zcad_core::geometry::Point2;
use zcad_core::transform::Mat2D;

use crate::convert::ConversionContext;
use crate::errors::ImportError;
use crate::normalize::normalize_shapes;
use crate::shapes::ShapeImport;
use crate::svg::SvgImport;
use crate::units::resolve_unit_scale;

/// 顶层实体数量上限，超过时两种导入都直接拒绝。
pub const MAX_ENTITIES: usize = 30_000;

fn oversized_array(entities: &[Entity]) -> Option<ImportError> {
    entities.iter().find_map(|entity| match entity {
        Entity::Insert(insert) => {
            let cells = insert.cell_count().unwrap_or(usize::MAX);
            (cells > MAX_ENTITIES).then(|| ImportError::ArrayTooLarge {
                block: insert.name.clone(),
                cells,
                limit: MAX_ENTITIES,
            })
        }
        _ => None,
    })
}

/// 在任何几何计算之前检查规模：顶层实体数与阵列单元数都不得超过上限，
/// 阵列插入按单元数计入顶层实体数。
fn check_entity_ceiling(doc: &Document) -> Result<(), ImportError> {
    let oversized = oversized_array(&doc.entities).or_else(|| {
        doc.blocks
            .values()
            .find_map(|block| oversized_array(&block.entities))
    });
    if let Some(error) = oversized {
        return Err(error);
    }

    let count = doc
        .entities
        .iter()
        .map(|entity| match entity {
            Entity::Insert(insert) => insert.cell_count().unwrap_or(usize::MAX),
            _ => 1,
        })
        .fold(0usize, usize::saturating_add);
    if count > MAX_ENTITIES {
        return Err(ImportError::TooManyEntities {
            count,
            limit: MAX_ENTITIES,
        });
    }
    Ok(())
}

/// 把图纸转换为厘米单位、以原点为最小角点的形状列表。
pub fn import_shapes(doc: &Document, options: &ImportOptions) -> Result<ShapeImport, ImportError> {
    check_entity_ceiling(doc)?;
    let units = resolve_unit_scale(doc, options.source_units);
    debug!(scale = units.scale, source = ?units.source, "单位换算已确定");

    let mut context = ConversionContext::new(doc, options);
    let drafts = context.convert_document(&Mat2D::from_scaling(units.scale, units.scale));

    let (layers, layer_ids) =
        context.layer_records(drafts.iter().map(|draft| draft.layer.as_str()));
    let mut shapes = context.finalize(drafts, &layer_ids);
    let bounds = normalize_shapes(&mut shapes);

    let (width, height, origin) = match bounds {
        Some(bounds) => (bounds.width(), bounds.height(), bounds.min()),
        None => (0.0, 0.0, Point2::ORIGIN),
    };
    let stats = context.stats;
    info!(
        shapes = shapes.len(),
        layers = layers.len(),
        width,
        height,
        block_expansions = stats.block_expansions,
        skipped = stats.entities_skipped,
        "形状导入完成"
    );

    Ok(ShapeImport {
        shapes,
        layers,
        width,
        height,
        origin,
        units_scale: units.scale,
        stats,
    })
}

/// 生成保持图纸单位的 SVG 底图，块定义写入 `<defs>` 并以 `<use>` 引用。
pub fn import_svg(doc: &Document, options: &ImportOptions) -> Result<SvgImport, ImportError> {
    check_entity_ceiling(doc)?;
    let units = resolve_unit_scale(doc, options.source_units);
    let svg = svg::write_svg(doc, options, units);
    info!(
        bytes = svg.markup.len(),
        view_box = %svg.view_box.to_attribute(),
        "SVG 底图生成完成"
    );
    Ok(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zcad_config::SourceUnits;
    use zcad_core::document::{BlockDefinition, Entity, EntityCommon, Insert, Line};

    fn line(start: (f64, f64), end: (f64, f64)) -> Entity {
        Entity::Line(Line {
            common: EntityCommon::on_layer("0"),
            start: Point2::new(start.0, start.1),
            end: Point2::new(end.0, end.1),
        })
    }

    fn centimeters() -> ImportOptions {
        ImportOptions {
            source_units: SourceUnits::Centimeters,
            ..ImportOptions::default()
        }
    }

    #[test]
    fn empty_document_produces_empty_import() {
        let doc = Document::new();
        let result = import_shapes(&doc, &centimeters()).expect("空图纸应可导入");
        assert!(result.shapes.is_empty());
        assert_eq!(result.width, 0.0);
        assert_eq!(result.height, 0.0);
        assert_eq!(result.layers.len(), 1);

        let svg = import_svg(&doc, &centimeters()).expect("空图纸应可生成底图");
        assert!(svg.markup.contains("viewBox=\"0 0 100 100\""));
    }

    #[test]
    fn entity_ceiling_is_enforced() {
        let mut doc = Document::new();
        for index in 0..=MAX_ENTITIES {
            let x = index as f64;
            doc.add_line(Point2::new(x, 0.0), Point2::new(x, 1.0), "0");
        }
        let error = import_shapes(&doc, &centimeters()).expect_err("应超过上限");
        assert!(matches!(
            error,
            ImportError::TooManyEntities { count, limit } if count == MAX_ENTITIES + 1 && limit == MAX_ENTITIES
        ));
        assert!(import_svg(&doc, &centimeters()).is_err());
    }

    #[test]
    fn oversized_array_insert_is_rejected() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("TILE", Point2::ORIGIN);
        block.entities.push(line((0.0, 0.0), (1.0, 0.0)));
        doc.add_block_definition(block);
        let mut insert = Insert::new("TILE", Point2::ORIGIN);
        insert.column_count = 70_000;
        insert.row_count = 70_000;
        doc.add_entity(Entity::Insert(insert));

        let error = import_shapes(&doc, &centimeters()).expect_err("阵列超过上限");
        assert!(matches!(
            &error,
            ImportError::ArrayTooLarge { block, cells, limit }
                if block == "TILE" && *cells > MAX_ENTITIES && *limit == MAX_ENTITIES
        ));
        assert!(import_svg(&doc, &centimeters()).is_err());
    }

    #[test]
    fn array_cells_count_towards_ceiling() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("TILE", Point2::ORIGIN);
        block.entities.push(line((0.0, 0.0), (1.0, 0.0)));
        doc.add_block_definition(block);
        for _ in 0..2 {
            let mut insert = Insert::new("TILE", Point2::ORIGIN);
            insert.column_count = 200;
            insert.row_count = 100;
            doc.add_entity(Entity::Insert(insert));
        }
        let error = import_shapes(&doc, &centimeters()).expect_err("单元总数超过上限");
        assert!(matches!(error, ImportError::TooManyEntities { count: 40_000, .. }));
    }

    #[test]
    fn nested_oversized_array_is_rejected() {
        let mut doc = Document::new();
        let mut inner = Insert::new("LEAF", Point2::ORIGIN);
        inner.column_count = u32::MAX;
        inner.row_count = 2;
        let mut block = BlockDefinition::new("OUTER", Point2::ORIGIN);
        block.entities.push(Entity::Insert(inner));
        doc.add_block_definition(block);
        doc.add_entity(Entity::Insert(Insert::new("OUTER", Point2::ORIGIN)));

        let error = import_svg(&doc, &centimeters()).expect_err("块内阵列超过上限");
        assert!(matches!(error, ImportError::ArrayTooLarge { ref block, .. } if block == "LEAF"));
    }

    #[test]
    fn shapes_are_normalized_to_origin() {
        let mut doc = Document::new();
        doc.add_entity(line((10.0, 20.0), (30.0, 25.0)));
        let result = import_shapes(&doc, &centimeters()).expect("导入失败");
        assert_eq!(result.shapes.len(), 1);
        assert_eq!(result.origin, Point2::new(10.0, 20.0));
        assert!((result.width - 20.0).abs() < 1e-9);
        assert!((result.height - 5.0).abs() < 1e-9);
        assert_eq!(result.shapes[0].id, "dxf-shape-1");
    }

    #[test]
    fn repeated_block_is_expanded_once() {
        let mut doc = Document::new();
        let mut block = BlockDefinition::new("DOOR", Point2::ORIGIN);
        block.entities.push(line((0.0, 0.0), (1.0, 0.0)));
        doc.add_block_definition(block);
        doc.add_entity(Entity::Insert(Insert::new("DOOR", Point2::new(0.0, 0.0))));
        doc.add_entity(Entity::Insert(Insert::new("DOOR", Point2::new(5.0, 5.0))));

        let result = import_shapes(&doc, &centimeters()).expect("导入失败");
        assert_eq!(result.shapes.len(), 2);
        assert_eq!(result.stats.block_expansions, 1);
        assert_eq!(result.stats.block_instances, 2);

        let svg = import_svg(&doc, &centimeters()).expect("生成底图失败");
        assert_eq!(svg.markup.matches("<use ").count(), 2);
        assert_eq!(svg.markup.matches("id=\"blk-DOOR\"").count(), 1);
    }
}
