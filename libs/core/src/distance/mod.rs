//! Distance kernels for exact (brute-force) vector comparison.
//!
//! Exact search is the accuracy oracle for every benchmark run, so these
//! kernels favor reproducibility over speed: a fixed left-to-right
//! accumulation order, no runtime CPU dispatch, no fused multiply-add.
//! Identical inputs always produce bit-identical results.
//!
//! ## Usage
//!
//! ```rust
//! use vecbench_core::distance::{dot, euclidean_squared, normalize};
//!
//! let a = vec![1.0, 2.0, 3.0];
//! let b = vec![4.0, 5.0, 6.0];
//!
//! assert_eq!(euclidean_squared(&a, &b), 27.0);
//! assert_eq!(dot(&a, &b), 32.0);
//! assert!(normalize(&[0.0, 0.0]).is_none());
//! ```

pub mod scalar;

pub use scalar::{dot, euclidean_squared, norm, normalize};
