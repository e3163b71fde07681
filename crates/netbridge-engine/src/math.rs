//! Dense Kernels
//!
//! Row-major single-precision helpers used by the reference layers.
//! Matrix arguments are flat slices; dimensions are passed explicitly.

use rand::Rng;

/// `y += alpha * x`
pub fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// `y = alpha * x`
pub fn scale_into(alpha: f32, x: &[f32], y: &mut [f32]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = alpha * xi;
    }
}

/// Inner product of two equal-length vectors
pub fn dot(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// `out[m×n] = a[m×k] · b[n×k]ᵀ`
pub fn matmul_nt(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], out: &mut [f32]) {
    for i in 0..m {
        let row = &a[i * k..(i + 1) * k];
        for j in 0..n {
            out[i * n + j] = dot(row, &b[j * k..(j + 1) * k]);
        }
    }
}

/// `out[m×k] = a[m×n] · b[n×k]`
pub fn matmul_nn(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], out: &mut [f32]) {
    out[..m * k].fill(0.0);
    for i in 0..m {
        for j in 0..n {
            let coeff = a[i * n + j];
            if coeff != 0.0 {
                axpy(coeff, &b[j * k..(j + 1) * k], &mut out[i * k..(i + 1) * k]);
            }
        }
    }
}

/// `out[n×k] += a[m×n]ᵀ · b[m×k]`
pub fn matmul_tn_acc(m: usize, n: usize, k: usize, a: &[f32], b: &[f32], out: &mut [f32]) {
    for i in 0..m {
        let b_row = &b[i * k..(i + 1) * k];
        for j in 0..n {
            let coeff = a[i * n + j];
            if coeff != 0.0 {
                axpy(coeff, b_row, &mut out[j * k..(j + 1) * k]);
            }
        }
    }
}

/// Fill with samples from `U(-scale, scale)`
pub fn uniform_fill<R: Rng>(rng: &mut R, scale: f32, out: &mut [f32]) {
    if scale <= 0.0 {
        out.fill(0.0);
        return;
    }
    for v in out {
        *v = rng.gen_range(-scale..scale);
    }
}
