//! Discrete Hankel transforms along r, one set per azimuthal mode.
//!
//! For mode m the spectral rows are kr_0 = 0 followed by
//! kr_n = alpha_{m,n} / rmax, with alpha_{m,n} the zeros of J_m. The three
//! orders a mode needs (m-1 for F-, m for scalars and Fz, m+1 for F+) share
//! these wavenumbers so the spectral curl and divergence stay consistent.
//!
//! The basis function of row n is J_p(kr_n r), which vanishes at rmax. At
//! kr = 0 it is zero except for order m-1 of modes m >= 1, where the limit
//! is r^(m-1): without it the order m-1 functions are not complete and the
//! transform loses most of its precision. Each order uses nr of the nr + 1
//! rows, so the forward transform is the inverse of a square matrix and
//! leaves the remaining row at zero.
use crate::error::ConfigError;
use crate::flds::bessel::{jn, jn_zeros};
use crate::geometry::Geometry;
use crate::Float;
use nalgebra::DMatrix;
use num_traits::Zero;
use rustfft::num_complex::Complex;

// Smallest singular value accepted, relative to the largest one.
const MIN_SINGULAR: Float = 1E-13;

pub struct HankelPair {
    pub order: i32,
    // nr + 1 rows by nr columns
    forward: DMatrix<Float>,
    // nr rows by nr + 1 columns
    inverse: DMatrix<Float>,
}

pub struct HankelMode {
    pub m: usize,
    /// nr + 1 radial wavenumbers, the first one zero.
    pub kr: Vec<Float>,
    // orders m-1, m, m+1
    pairs: [HankelPair; 3],
}

impl HankelPair {
    fn new(m: usize, order: i32, kr: &[Float], geom: &Geometry) -> Result<HankelPair, ConfigError> {
        let nr = geom.nr;
        let axis_row = m > 0 && order == m as i32 - 1;
        let inverse = DMatrix::from_fn(nr, nr + 1, |j, n| {
            let r = geom.r(j);
            if n > 0 {
                jn(order, kr[n] * r)
            } else if axis_row {
                (r / geom.rmax).powi(order)
            } else {
                0.0
            }
        });
        // rows used by this order
        let first = if axis_row { 0 } else { 1 };
        let svd = inverse.columns(first, nr).into_owned().svd(true, true);
        let s_max = svd.singular_values.max();
        let s_min = svd.singular_values.min();
        if !(s_min > MIN_SINGULAR * s_max) {
            return Err(ConfigError::SingularHankel { m, order });
        }
        let square = svd
            .pseudo_inverse(0.0)
            .map_err(|_| ConfigError::SingularHankel { m, order })?;
        let mut forward = DMatrix::zeros(nr + 1, nr);
        forward.rows_mut(first, nr).copy_from(&square);
        if forward.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::SingularHankel { m, order });
        }
        Ok(HankelPair {
            order,
            forward,
            inverse,
        })
    }

    /// out[k, col] = sum_j M[k, j] input[j, col], rows of length `ncol`.
    fn apply(mat: &DMatrix<Float>, input: &[Complex<Float>], out: &mut [Complex<Float>], ncol: usize) {
        if !cfg!(feature = "unchecked") {
            assert_eq!(input.len(), mat.ncols() * ncol);
            assert_eq!(out.len(), mat.nrows() * ncol);
        }
        for v in out.iter_mut() {
            *v = Complex::zero();
        }
        for (k, out_row) in out.chunks_mut(ncol).enumerate() {
            for (j, in_row) in input.chunks(ncol).enumerate() {
                let mkj = mat[(k, j)];
                for (o, i) in out_row.iter_mut().zip(in_row) {
                    *o += *i * mkj;
                }
            }
        }
    }

    /// Spectral coefficients of `input`, refined once against the inverse
    /// transform. `resid` has the size of `input` and `corr` of `out`.
    pub fn forward(
        &self,
        input: &[Complex<Float>],
        out: &mut [Complex<Float>],
        resid: &mut [Complex<Float>],
        corr: &mut [Complex<Float>],
        ncol: usize,
    ) {
        HankelPair::apply(&self.forward, input, out, ncol);
        HankelPair::apply(&self.inverse, out, resid, ncol);
        for (r, x) in resid.iter_mut().zip(input) {
            *r = x - *r;
        }
        HankelPair::apply(&self.forward, resid, corr, ncol);
        for (o, c) in out.iter_mut().zip(corr.iter()) {
            *o += c;
        }
    }

    pub fn inverse(&self, input: &[Complex<Float>], out: &mut [Complex<Float>], ncol: usize) {
        HankelPair::apply(&self.inverse, input, out, ncol);
    }
}

impl HankelMode {
    pub fn new(m: usize, geom: &Geometry) -> Result<HankelMode, ConfigError> {
        let kr: Vec<Float> = std::iter::once(0.0)
            .chain(jn_zeros(m, geom.nr).into_iter().map(|alpha| alpha / geom.rmax))
            .collect();
        let p = m as i32;
        let pairs = [
            HankelPair::new(m, p - 1, &kr, geom)?,
            HankelPair::new(m, p, &kr, geom)?,
            HankelPair::new(m, p + 1, &kr, geom)?,
        ];
        Ok(HankelMode { m, kr, pairs })
    }

    pub fn pair(&self, order: i32) -> &HankelPair {
        let idx = order - (self.m as i32 - 1);
        if !cfg!(feature = "unchecked") {
            assert!((0..3).contains(&idx), "order {} not held by mode {}", order, self.m);
        }
        &self.pairs[idx as usize]
    }
}
