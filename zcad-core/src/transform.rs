//! 二维仿射变换，以 `glam::DAffine2` 为底层表示。
//!
//! 系数约定 `[x', y'] = [a c; b d]·[x, y] + [e, f]`。

use std::ops::Mul;

use glam::{DAffine2, DMat2, DVec2};
use serde::{Deserialize, Serialize};

use crate::geometry::{Point2, Vector2};

const SIMILARITY_RELATIVE_TOLERANCE: f64 = 1e-6;

/// 相似变换判定结果，`scale` 为提取出的均匀缩放系数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub ok: bool,
    pub scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat2D(pub DAffine2);

impl Default for Mat2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat2D {
    #[inline]
    pub fn identity() -> Self {
        Self(DAffine2::IDENTITY)
    }

    /// 由六个系数构造。
    pub fn from_coefficients(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self(DAffine2::from_mat2_translation(
            DMat2::from_cols(DVec2::new(a, b), DVec2::new(c, d)),
            DVec2::new(e, f),
        ))
    }

    #[inline]
    pub fn from_translation(x: f64, y: f64) -> Self {
        Self(DAffine2::from_translation(DVec2::new(x, y)))
    }

    #[inline]
    pub fn from_scaling(sx: f64, sy: f64) -> Self {
        Self(DAffine2::from_scale(DVec2::new(sx, sy)))
    }

    /// 逆时针旋转，角度为弧度。
    #[inline]
    pub fn from_rotation(radians: f64) -> Self {
        Self(DAffine2::from_angle(radians))
    }

    /// 组合变换：先应用 `second`，再应用 `first`。
    #[inline]
    pub fn multiply(first: &Mat2D, second: &Mat2D) -> Mat2D {
        Mat2D(first.0 * second.0)
    }

    #[inline]
    pub fn a(&self) -> f64 {
        self.0.matrix2.x_axis.x
    }

    #[inline]
    pub fn b(&self) -> f64 {
        self.0.matrix2.x_axis.y
    }

    #[inline]
    pub fn c(&self) -> f64 {
        self.0.matrix2.y_axis.x
    }

    #[inline]
    pub fn d(&self) -> f64 {
        self.0.matrix2.y_axis.y
    }

    #[inline]
    pub fn e(&self) -> f64 {
        self.0.translation.x
    }

    #[inline]
    pub fn f(&self) -> f64 {
        self.0.translation.y
    }

    /// 按 `a b c d e f` 顺序导出系数，对应 SVG `matrix(...)`。
    pub fn coefficients(&self) -> [f64; 6] {
        [self.a(), self.b(), self.c(), self.d(), self.e(), self.f()]
    }

    #[inline]
    pub fn apply_to_point(&self, point: Point2) -> Point2 {
        Point2::from_vec(self.0.transform_point2(point.as_vec2()))
    }

    /// 只作用线性部分，忽略平移。
    #[inline]
    pub fn apply_to_vector(&self, vector: Vector2) -> Vector2 {
        Vector2::from(self.0.transform_vector2(vector.as_vec2()))
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.0.matrix2.determinant()
    }

    pub fn is_identity(&self) -> bool {
        self.0.abs_diff_eq(DAffine2::IDENTITY, 1e-12)
    }

    /// 线性部分两列正交且等长（允许镜像）时为相似变换。
    pub fn is_similarity_transform(&self) -> Similarity {
        let column_x = self.0.matrix2.x_axis;
        let column_y = self.0.matrix2.y_axis;
        let length_x = column_x.length();
        let length_y = column_y.length();
        let reference = length_x.max(length_y);
        if !reference.is_finite() || reference <= f64::EPSILON {
            return Similarity {
                ok: false,
                scale: 0.0,
            };
        }
        let tolerance = SIMILARITY_RELATIVE_TOLERANCE * reference;
        let equal_length = (length_x - length_y).abs() <= tolerance;
        let orthogonal = column_x.dot(column_y).abs() <= tolerance * reference;
        Similarity {
            ok: equal_length && orthogonal,
            scale: (length_x + length_y) * 0.5,
        }
    }
}

impl Mul for Mat2D {
    type Output = Mat2D;

    fn mul(self, rhs: Mat2D) -> Mat2D {
        Mat2D::multiply(&self, &rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_point(actual: Point2, x: f64, y: f64) {
        assert!(
            actual.approx_eq(Point2::new(x, y), 1e-9),
            "期望 ({x}, {y})，实际 ({}, {})",
            actual.x(),
            actual.y()
        );
    }

    #[test]
    fn multiply_applies_right_operand_first() {
        let translate = Mat2D::from_translation(10.0, 0.0);
        let rotate = Mat2D::from_rotation(FRAC_PI_2);
        let composed = Mat2D::multiply(&translate, &rotate);
        // 先旋转 (1, 0) → (0, 1)，再平移。
        assert_point(composed.apply_to_point(Point2::new(1.0, 0.0)), 10.0, 1.0);

        let reversed = rotate * translate;
        assert_point(reversed.apply_to_point(Point2::new(1.0, 0.0)), 0.0, 11.0);
    }

    #[test]
    fn coefficients_follow_column_convention() {
        let matrix = Mat2D::from_coefficients(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        assert_eq!(matrix.coefficients(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // x' = a·x + c·y + e
        assert_point(matrix.apply_to_point(Point2::new(1.0, 1.0)), 9.0, 12.0);
        assert!((matrix.determinant() - (1.0 * 4.0 - 3.0 * 2.0)).abs() < 1e-12);
        let vector = matrix.apply_to_vector(Vector2::new(1.0, 0.0));
        assert_eq!(vector, Vector2::new(1.0, 2.0));
    }

    #[test]
    fn similarity_accepts_rotation_uniform_scale_and_mirror() {
        let rotated = Mat2D::from_rotation(0.7) * Mat2D::from_scaling(2.5, 2.5);
        let similarity = rotated.is_similarity_transform();
        assert!(similarity.ok);
        assert!((similarity.scale - 2.5).abs() < 1e-9);

        let mirrored = Mat2D::from_scaling(-3.0, 3.0);
        let similarity = mirrored.is_similarity_transform();
        assert!(similarity.ok);
        assert!((similarity.scale - 3.0).abs() < 1e-9);
        assert!(mirrored.determinant() < 0.0);
    }

    #[test]
    fn similarity_rejects_non_uniform_scale_and_shear() {
        assert!(!Mat2D::from_scaling(2.0, 1.0).is_similarity_transform().ok);
        let shear = Mat2D::from_coefficients(1.0, 0.0, 0.5, 1.0, 0.0, 0.0);
        assert!(!shear.is_similarity_transform().ok);
        assert!(!Mat2D::from_scaling(0.0, 0.0).is_similarity_transform().ok);
    }

    #[test]
    fn identity_detection() {
        assert!(Mat2D::identity().is_identity());
        assert!(Mat2D::default().is_identity());
        assert!(!Mat2D::from_translation(1.0, 0.0).is_identity());
    }
}
