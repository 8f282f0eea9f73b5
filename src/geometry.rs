// src/geometry.rs - 3D vector primitives shared by all angle calculators
use nalgebra::Vector3;

/// Minimum vector magnitude treated as non-degenerate.
const EPSILON: f64 = 1e-10;

pub fn distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm()
}

pub fn midpoint(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    (a + b) / 2.0
}

pub fn magnitude(v: &Vector3<f64>) -> f64 {
    v.norm()
}

pub fn dot(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    a.dot(b)
}

pub fn cross(a: &Vector3<f64>, b: &Vector3<f64>) -> Vector3<f64> {
    a.cross(b)
}

/// Normalize, mapping degenerate vectors to zero instead of NaN.
pub fn normalize(v: &Vector3<f64>) -> Vector3<f64> {
    let mag = v.norm();
    if mag < EPSILON {
        Vector3::zeros()
    } else {
        v / mag
    }
}

/// Angle between two direction vectors in degrees.
///
/// Zero-magnitude input yields 0.0 rather than NaN; the cosine is clamped
/// to [-1, 1] before acos to avoid floating-point domain errors.
pub fn angle_between_vectors(v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    let mag1 = v1.norm();
    let mag2 = v2.norm();

    if mag1 < EPSILON || mag2 < EPSILON {
        return 0.0;
    }

    let cos_angle = (v1.dot(v2) / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos().to_degrees()
}

/// Angle at vertex `b` between the rays toward `a` and `c`, in degrees.
pub fn angle_between(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> f64 {
    angle_between_vectors(&(a - b), &(c - b))
}
