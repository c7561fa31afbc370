//! 形状列表的范围计算、原点平移与文字缩放烘焙。

use zcad_core::geometry::{Bounds2D, Point2};

use crate::shapes::{ShapeGeometry, ShapeRecord, TextShape};

/// 所有形状的合并范围，没有可用几何时返回 `None`。
pub fn compute_bounds(shapes: &[ShapeRecord]) -> Option<Bounds2D> {
    let mut bounds = Bounds2D::empty();
    for shape in shapes {
        if let Some(shape_bounds) = shape.geometry.bounds() {
            bounds.include_bounds(&shape_bounds);
        }
    }
    if bounds.is_empty() { None } else { Some(bounds) }
}

/// 把竖向缩放的绝对值并入字号，横向缩放相应归一，只保留竖向镜像符号。
pub fn bake_text_scale(text: &mut TextShape) {
    let magnitude = text.scale_y.abs();
    if magnitude <= f64::EPSILON || !magnitude.is_finite() {
        return;
    }
    text.font_size *= magnitude;
    text.scale_x /= magnitude;
    text.scale_y = text.scale_y.signum();
}

/// 平移使最小角点落在原点，并烘焙文字缩放。返回平移前的范围。
pub fn normalize_shapes(shapes: &mut [ShapeRecord]) -> Option<Bounds2D> {
    let bounds = compute_bounds(shapes);
    let offset = bounds.map(|bounds| bounds.min().vector_to(Point2::ORIGIN));
    for shape in shapes.iter_mut() {
        if let Some(offset) = offset {
            shape.geometry.translate(offset);
        }
        if let ShapeGeometry::Text(text) = &mut shape.geometry {
            bake_text_scale(text);
        }
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{TextAlign, TextBaseline};

    fn record(geometry: ShapeGeometry) -> ShapeRecord {
        ShapeRecord {
            id: "s".into(),
            layer_id: "l".into(),
            floor_id: None,
            stroke_color: "#000000".into(),
            fill_color: None,
            stroke_width: 0.025,
            stroke_dash: Vec::new(),
            geometry,
        }
    }

    fn text(scale_x: f64, scale_y: f64, font_size: f64) -> TextShape {
        TextShape {
            position: Point2::new(4.0, 4.0),
            rotation: 0.0,
            scale_x,
            scale_y,
            content: "A".into(),
            font_size,
            font_family: None,
            align: TextAlign::Left,
            baseline: TextBaseline::Alphabetic,
        }
    }

    #[test]
    fn empty_input_has_no_bounds() {
        assert!(compute_bounds(&[]).is_none());
        let mut shapes: Vec<ShapeRecord> = Vec::new();
        assert!(normalize_shapes(&mut shapes).is_none());
    }

    #[test]
    fn text_scale_is_baked_into_font_size() {
        let mut shape = text(3.0, -2.0, 1.25);
        bake_text_scale(&mut shape);
        assert!((shape.font_size - 2.5).abs() < 1e-12);
        assert!((shape.scale_x - 1.5).abs() < 1e-12);
        assert_eq!(shape.scale_y, -1.0);
    }

    #[test]
    fn shapes_are_moved_to_origin() {
        let mut shapes = vec![
            record(ShapeGeometry::Line {
                start: Point2::new(10.0, 5.0),
                end: Point2::new(20.0, 5.0),
            }),
            record(ShapeGeometry::Circle {
                center: Point2::new(15.0, 10.0),
                radius: 2.0,
            }),
            record(ShapeGeometry::Text(text(1.0, 2.0, 1.0))),
        ];
        let bounds = normalize_shapes(&mut shapes).expect("应有范围");
        assert_eq!(bounds.min(), Point2::new(4.0, 4.0));
        assert_eq!(bounds.max(), Point2::new(20.0, 12.0));

        match &shapes[0].geometry {
            ShapeGeometry::Line { start, .. } => assert_eq!(*start, Point2::new(6.0, 1.0)),
            other => panic!("期望线段，实际 {}", other.kind()),
        }
        let moved = shapes[2].text().expect("第三个形状是文字");
        assert_eq!(moved.position, Point2::ORIGIN);
        assert!((moved.font_size - 2.0).abs() < 1e-12);
        assert!((moved.scale_x - 0.5).abs() < 1e-12);
        assert_eq!(moved.scale_y, 1.0);

        let after = compute_bounds(&shapes).expect("平移后仍有范围");
        assert_eq!(after.min(), Point2::ORIGIN);
    }
}
