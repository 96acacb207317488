//! Scalar distance implementations.
//!
//! These are portable implementations that work on any platform.
//! They may still benefit from auto-vectorization by the compiler.

/// Compute squared Euclidean distance
///
/// Returns sum((a[i] - b[i])^2) for all i. Ranking by squared distance is
/// identical to ranking by Euclidean distance and skips the sqrt.
#[inline]
pub fn euclidean_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Compute dot product
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) norm of a vector
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit L2 norm.
///
/// Returns `None` for a zero-norm (or non-finite norm) vector: there is no
/// direction to preserve, and the caller decides how such vectors rank.
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let n = norm(v);
    if n == 0.0 || !n.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / n).collect())
}
