//! 曲线离散：圆弧、凸度弧与（有理）B 样条转折线。
//!
//! 所有函数都是纯计算，退化输入返回空结果或原样返回，不产生错误。

use std::f64::consts::TAU;

use crate::geometry::{Point2, Vector2};

/// 弧的最少分段数，保证大容差下仍能辨认出圆。
pub const MIN_ARC_SEGMENTS: usize = 8;
/// 样条采样步数上限。
pub const MAX_SPLINE_STEPS: usize = 4096;

const MIN_TOLERANCE_RAD: f64 = 1e-3;
const FULL_SWEEP_EPSILON: f64 = 1e-9;
const BULGE_EPSILON: f64 = 1e-10;
const COINCIDENT_EPSILON: f64 = 1e-10;
const WEIGHT_EPSILON: f64 = 1e-12;

fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid 对极小负数可能返回 TAU 本身。
    if wrapped >= TAU { 0.0 } else { wrapped }
}

fn segment_count(sweep: f64, tolerance_deg: f64) -> usize {
    let tolerance_rad = tolerance_deg.to_radians().max(MIN_TOLERANCE_RAD);
    let raw = (sweep.abs() / tolerance_rad).ceil();
    if raw.is_finite() {
        (raw as usize).max(MIN_ARC_SEGMENTS)
    } else {
        MIN_ARC_SEGMENTS
    }
}

/// 共享的弧采样，包含两个端点。
fn arc_points(center: Point2, radius: f64, start: f64, sweep: f64, tolerance_deg: f64) -> Vec<Point2> {
    let segments = segment_count(sweep, tolerance_deg);
    (0..=segments)
        .map(|index| {
            let angle = start + sweep * index as f64 / segments as f64;
            center.translate(Vector2::new(radius * angle.cos(), radius * angle.sin()))
        })
        .collect()
}

/// 圆弧离散，结果包含首尾端点。
///
/// 起止角先归一化到 `[0, 2π)`，再按方向求带符号扫掠角；扫掠角接近 0 时视为整圆。
pub fn tessellate_arc(
    center: Point2,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    ccw: bool,
    tolerance_deg: f64,
) -> Vec<Point2> {
    let start = normalize_angle(start_angle);
    let end = normalize_angle(end_angle);
    let mut sweep = if ccw {
        normalize_angle(end - start)
    } else {
        -normalize_angle(start - end)
    };
    if sweep.abs() < FULL_SWEEP_EPSILON {
        sweep = if ccw { TAU } else { -TAU };
    }
    arc_points(center, radius, start, sweep, tolerance_deg)
}

pub fn tessellate_circle(center: Point2, radius: f64, tolerance_deg: f64) -> Vec<Point2> {
    arc_points(center, radius, 0.0, TAU, tolerance_deg)
}

/// 由凸度推出的圆弧参数。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    /// 带符号扫掠角，正值为逆时针。
    pub sweep: f64,
}

/// 凸度 `b = tan(θ/4)`；直线段或端点重合时返回 `None`。
pub fn bulge_arc(start: Point2, end: Point2, bulge: f64) -> Option<BulgeArc> {
    if bulge.abs() < BULGE_EPSILON {
        return None;
    }
    let chord = Vector2::from_points(start, end);
    let distance = chord.length();
    if distance < COINCIDENT_EPSILON || !distance.is_finite() {
        return None;
    }
    let radius = distance * (1.0 + bulge * bulge) / (4.0 * bulge.abs());
    let offset = (1.0 - bulge * bulge) / (4.0 * bulge);
    let mid = start.midpoint(end);
    let center = Point2::new(mid.x() - chord.y() * offset, mid.y() + chord.x() * offset);
    let start_angle = center.vector_to(start).angle();
    Some(BulgeArc {
        center,
        radius,
        start_angle,
        sweep: 4.0 * bulge.atan(),
    })
}

/// 凸度弧离散，只返回内部点（不含两个端点）。
pub fn tessellate_bulge(start: Point2, end: Point2, bulge: f64, tolerance_deg: f64) -> Vec<Point2> {
    let Some(arc) = bulge_arc(start, end, bulge) else {
        return Vec::new();
    };
    let mut points = arc_points(arc.center, arc.radius, arc.start_angle, arc.sweep, tolerance_deg);
    points.pop();
    if !points.is_empty() {
        points.remove(0);
    }
    points
}

/// 默认的夹持均匀节点向量：`degree + 1` 个 0，内部整数节点，`degree + 1` 个末值。
pub fn clamped_uniform_knots(control_count: usize, degree: usize) -> Vec<f64> {
    let interior = control_count.saturating_sub(degree + 1);
    let last = (interior + 1) as f64;
    let mut knots = Vec::with_capacity(control_count + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    knots.extend((1..=interior).map(|value| value as f64));
    knots.extend(std::iter::repeat_n(last, degree + 1));
    knots
}

fn find_span(knots: &[f64], degree: usize, control_count: usize, t: f64) -> usize {
    let last_span = control_count - 1;
    if t >= knots[control_count] {
        return last_span;
    }
    (degree..control_count)
        .find(|&span| t >= knots[span] && t < knots[span + 1])
        .unwrap_or(last_span)
}

/// 迭代三角表求 `span` 处非零的 `degree + 1` 个基函数值（Cox–de Boor）。
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    let mut basis = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    basis[0] = 1.0;
    for j in 1..=degree {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let denominator = right[r + 1] + left[j - r];
            let term = if denominator.abs() > f64::EPSILON {
                basis[r] / denominator
            } else {
                0.0
            };
            basis[r] = saved + right[r + 1] * term;
            saved = left[j - r] * term;
        }
        basis[j] = saved;
    }
    basis
}

/// 有理 B 样条采样。
///
/// 节点或权重长度不匹配时退回默认值；控制点少于 `degree + 1` 时原样返回。
pub fn tessellate_spline(
    control_points: &[Point2],
    degree: usize,
    knots: Option<&[f64]>,
    weights: Option<&[f64]>,
    resolution: u32,
) -> Vec<Point2> {
    let count = control_points.len();
    if degree == 0 || count < degree + 1 {
        return control_points.to_vec();
    }

    let expected_knots = count + degree + 1;
    let knots: Vec<f64> = match knots {
        Some(values)
            if values.len() == expected_knots
                && values.windows(2).all(|pair| pair[0] <= pair[1]) =>
        {
            values.to_vec()
        }
        _ => clamped_uniform_knots(count, degree),
    };
    let weights: Vec<f64> = match weights {
        Some(values) if values.len() == count => values.to_vec(),
        _ => vec![1.0; count],
    };

    let t_min = knots[degree];
    let t_max = knots[count];
    let range = t_max - t_min;
    if range <= 0.0 || !range.is_finite() {
        return control_points.to_vec();
    }

    let raw_steps = (range * resolution.max(1) as f64).ceil();
    let steps = if raw_steps.is_finite() {
        (raw_steps as usize).clamp(1, MAX_SPLINE_STEPS)
    } else {
        MAX_SPLINE_STEPS
    };
    let nudge = range * 1e-9;

    let mut samples = Vec::with_capacity(steps + 1);
    for step in 0..=steps {
        let t = if step == steps {
            t_max - nudge
        } else {
            t_min + range * step as f64 / steps as f64
        };
        let span = find_span(&knots, degree, count, t);
        let basis = basis_functions(&knots, span, degree, t);

        let mut numerator = glam::DVec2::ZERO;
        let mut denominator = 0.0;
        for (offset, value) in basis.iter().enumerate() {
            let index = span - degree + offset;
            let weight = weights[index];
            if weight.abs() < WEIGHT_EPSILON {
                continue;
            }
            let factor = value * weight;
            numerator += control_points[index].as_vec2() * factor;
            denominator += factor;
        }
        if denominator.abs() < WEIGHT_EPSILON {
            continue;
        }
        samples.push(Point2::from_vec(numerator / denominator));
    }
    samples
}
