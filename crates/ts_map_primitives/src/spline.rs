//! Reine Spline-Mathematik (Hermite und Catmull-Rom) in 3D.
//!
//! Die Kurve eines Segments verläuft immer von `p0` nach `p1` (Hermite)
//! bzw. von `p1` nach `p2` (Catmull-Rom), Parameter `t ∈ [0, 1]`.

use glam::Vec3;

/// Stützstellen der 5-Punkt-Gauss-Legendre-Quadratur auf [-1, 1].
const GAUSS_NODES: [f32; 5] = [
    0.0,
    -0.538_469_3,
    0.538_469_3,
    -0.906_179_85,
    0.906_179_85,
];
/// Gewichte zu [`GAUSS_NODES`].
const GAUSS_WEIGHTS: [f32; 5] = [
    0.568_888_9,
    0.478_628_67,
    0.478_628_67,
    0.236_926_88,
    0.236_926_88,
];
/// Teilintervalle für die Längen-Integration.
const LENGTH_SUBDIVISIONS: usize = 8;

/// Punkt auf einem kubischen Hermite-Segment.
pub fn hermite_point(p0: Vec3, t0: Vec3, p1: Vec3, t1: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * p0 + h10 * t0 + h01 * p1 + h11 * t1
}

/// Erste Ableitung eines Hermite-Segments nach `t`.
pub fn hermite_derivative(p0: Vec3, t0: Vec3, p1: Vec3, t1: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let d00 = 6.0 * t2 - 6.0 * t;
    let d10 = 3.0 * t2 - 4.0 * t + 1.0;
    let d01 = -6.0 * t2 + 6.0 * t;
    let d11 = 3.0 * t2 - 2.0 * t;
    d00 * p0 + d10 * t0 + d01 * p1 + d11 * t1
}

/// Bogenlänge eines Hermite-Segments zwischen `t = 0` und `t = until`.
pub fn hermite_length_until(p0: Vec3, t0: Vec3, p1: Vec3, t1: Vec3, until: f32) -> f32 {
    let until = until.clamp(0.0, 1.0);
    if until <= 0.0 {
        return 0.0;
    }
    let step = until / LENGTH_SUBDIVISIONS as f32;
    let mut length = 0.0;
    for segment in 0..LENGTH_SUBDIVISIONS {
        let a = segment as f32 * step;
        let half = step * 0.5;
        let mid = a + half;
        for (node, weight) in GAUSS_NODES.iter().zip(GAUSS_WEIGHTS.iter()) {
            let t = mid + half * node;
            length += weight * half * hermite_derivative(p0, t0, p1, t1, t).length();
        }
    }
    length
}

/// Bogenlänge eines vollständigen Hermite-Segments.
pub fn hermite_length(p0: Vec3, t0: Vec3, p1: Vec3, t1: Vec3) -> f32 {
    hermite_length_until(p0, t0, p1, t1, 1.0)
}

/// Sucht den Parameter `t`, an dem die Bogenlänge `distance` erreicht ist.
///
/// Gibt `None` zurück, wenn `distance` negativ ist oder die Segmentlänge übersteigt.
pub fn hermite_param_at_length(
    p0: Vec3,
    t0: Vec3,
    p1: Vec3,
    t1: Vec3,
    distance: f32,
) -> Option<f32> {
    let total = hermite_length(p0, t0, p1, t1);
    if distance < 0.0 || distance > total + f32::EPSILON * total.max(1.0) {
        return None;
    }
    if total <= f32::EPSILON {
        return Some(0.0);
    }

    // Bisektion: Bogenlänge ist monoton in t
    let mut low = 0.0f32;
    let mut high = 1.0f32;
    for _ in 0..32 {
        let mid = 0.5 * (low + high);
        if hermite_length_until(p0, t0, p1, t1, mid) < distance {
            low = mid;
        } else {
            high = mid;
        }
    }
    Some(0.5 * (low + high))
}

/// Punkt auf einem Catmull-Rom-Segment (Kurve von `p1` nach `p2`).
pub fn catmull_rom_point(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Ableitung eines Catmull-Rom-Segments nach `t`.
pub fn catmull_rom_derivative(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    0.5 * ((-p0 + p2)
        + 2.0 * (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t
        + 3.0 * (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t2)
}
