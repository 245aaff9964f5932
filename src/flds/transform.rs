use crate::error::ConfigError;
use crate::flds::field::{Field, FieldDim, VecField};
use crate::flds::hankel::HankelMode;
use crate::geometry::Geometry;
use crate::Float;
use num_traits::Zero;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::sync::Arc;
use tracing::debug;

/// Fourier transform along z, Hankel transform along r, mode by mode.
///
/// Real-space rows of length nz are zero padded up to the spectral length
/// before the FFT; the inverse truncates back to nz, so
/// `to_real(to_spectral(x)) == x` up to round-off.
pub struct SpectralTransform {
    dim: FieldDim,
    spectral_dim: FieldDim,
    fft_z: Arc<dyn rustfft::Fft<Float>>,
    ifft_z: Arc<dyn rustfft::Fft<Float>>,
    scratch: Vec<Complex<Float>>,
    // nr rows of padded length, the z-transformed input of the Hankel step
    wrkspace: Vec<Complex<Float>>,
    // residual and correction of the refined forward Hankel transform
    resid: Vec<Complex<Float>>,
    corr: Vec<Complex<Float>>,
    hankel: Vec<HankelMode>,
}

impl SpectralTransform {
    pub fn new(geom: &Geometry) -> Result<SpectralTransform, ConfigError> {
        let mut planner = FftPlanner::new();
        let fft_z = planner.plan_fft_forward(geom.nz_spectral);
        let ifft_z = planner.plan_fft_inverse(geom.nz_spectral);
        let scratch_len = fft_z
            .get_inplace_scratch_len()
            .max(ifft_z.get_inplace_scratch_len());
        let hankel = (0..geom.nm)
            .map(|m| HankelMode::new(m, geom))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(nm = geom.nm, nr = geom.nr, "built Hankel matrices");

        Ok(SpectralTransform {
            dim: FieldDim {
                size_r: geom.nr,
                size_z: geom.nz,
            },
            spectral_dim: FieldDim {
                size_r: geom.nr_spectral,
                size_z: geom.nz_spectral,
            },
            fft_z,
            ifft_z,
            scratch: vec![Complex::zero(); scratch_len],
            wrkspace: vec![Complex::zero(); geom.nr * geom.nz_spectral],
            resid: vec![Complex::zero(); geom.nr * geom.nz_spectral],
            corr: vec![Complex::zero(); geom.spectral_len()],
            hankel,
        })
    }

    pub fn kr(&self, m: usize) -> &[Float] {
        &self.hankel[m].kr
    }

    pub fn n_modes(&self) -> usize {
        self.hankel.len()
    }

    /// Copy `input` into `buf` row by row, zero padding each row.
    fn pad_rows(input: &[Complex<Float>], buf: &mut [Complex<Float>], nz: usize, nzs: usize) {
        for (row_in, row_out) in input.chunks(nz).zip(buf.chunks_mut(nzs)) {
            row_out[..nz].copy_from_slice(row_in);
            for v in row_out[nz..].iter_mut() {
                *v = Complex::zero();
            }
        }
    }

    /// Spectral coefficients of a real-space array of mode `m`, using the
    /// Hankel transform of the given order.
    pub fn to_spectral_mode(
        &mut self,
        m: usize,
        order: i32,
        input: &[Complex<Float>],
        out: &mut [Complex<Float>],
    ) {
        let nz = self.dim.size_z;
        let nzs = self.spectral_dim.size_z;
        if !cfg!(feature = "unchecked") {
            assert_eq!(input.len(), self.dim.len());
            assert_eq!(out.len(), self.spectral_dim.len());
        }
        SpectralTransform::pad_rows(input, &mut self.wrkspace, nz, nzs);
        // Every row is one FFT.
        self.fft_z
            .process_with_scratch(&mut self.wrkspace, &mut self.scratch);
        self.hankel[m].pair(order).forward(
            &self.wrkspace,
            out,
            &mut self.resid,
            &mut self.corr,
            nzs,
        );
    }

    pub fn to_real_mode(
        &mut self,
        m: usize,
        order: i32,
        input: &[Complex<Float>],
        out: &mut [Complex<Float>],
    ) {
        let nz = self.dim.size_z;
        let nzs = self.spectral_dim.size_z;
        if !cfg!(feature = "unchecked") {
            assert_eq!(input.len(), self.spectral_dim.len());
            assert_eq!(out.len(), self.dim.len());
        }
        self.hankel[m]
            .pair(order)
            .inverse(input, &mut self.wrkspace, nzs);
        self.ifft_z
            .process_with_scratch(&mut self.wrkspace, &mut self.scratch);
        let norm = (nzs as Float).powi(-1);
        for (row_in, row_out) in self.wrkspace.chunks(nzs).zip(out.chunks_mut(nz)) {
            for (o, i) in row_out.iter_mut().zip(&row_in[..nz]) {
                *o = *i * norm;
            }
        }
    }

    pub fn scalar_to_spectral(&mut self, fld: &mut Field) {
        for m in 0..fld.n_modes() {
            self.to_spectral_mode(m, m as i32, &fld.spatial[m], &mut fld.spectral[m]);
        }
    }

    pub fn scalar_to_real(&mut self, fld: &mut Field) {
        for m in 0..fld.n_modes() {
            self.to_real_mode(m, m as i32, &fld.spectral[m], &mut fld.spatial[m]);
        }
        let im_sum = fld.enforce_real_axis();
        debug!(field = fld.name, im_sum, "dropped mode 0 imaginary residual");
    }

    /// (Fr, Ft) -> (F+, F-) with F+ of order m+1 and F- of order m-1.
    pub fn vector_to_spectral(&mut self, v: &mut VecField) {
        let i = Complex::<Float>::i();
        let n = self.dim.len();
        for m in 0..v.r.n_modes() {
            let mut plus = vec![Complex::zero(); n];
            let mut minus = vec![Complex::zero(); n];
            for (p, mi, fr, ft) in itertools::izip!(
                plus.iter_mut(),
                minus.iter_mut(),
                &v.r.spatial[m],
                &v.t.spatial[m]
            ) {
                *p = 0.5 * (fr - i * ft);
                *mi = 0.5 * (fr + i * ft);
            }
            let p = m as i32;
            self.to_spectral_mode(m, p + 1, &plus, &mut v.r.spectral[m]);
            self.to_spectral_mode(m, p - 1, &minus, &mut v.t.spectral[m]);
            self.to_spectral_mode(m, p, &v.z.spatial[m], &mut v.z.spectral[m]);
        }
    }

    /// (F+, F-) -> (Fr, Ft) with Fr = F+ + F- and Ft = i (F+ - F-).
    pub fn vector_to_real(&mut self, v: &mut VecField) {
        let i = Complex::<Float>::i();
        let n = self.dim.len();
        let mut plus = vec![Complex::zero(); n];
        let mut minus = vec![Complex::zero(); n];
        for m in 0..v.r.n_modes() {
            let p = m as i32;
            self.to_real_mode(m, p + 1, &v.r.spectral[m], &mut plus);
            self.to_real_mode(m, p - 1, &v.t.spectral[m], &mut minus);
            for (fr, ft, pl, mi) in itertools::izip!(
                v.r.spatial[m].iter_mut(),
                v.t.spatial[m].iter_mut(),
                &plus,
                &minus
            ) {
                *fr = pl + mi;
                *ft = i * (pl - mi);
            }
            self.to_real_mode(m, p, &v.z.spectral[m], &mut v.z.spatial[m]);
        }
        for c in v.components_mut() {
            let im_sum = c.enforce_real_axis();
            debug!(field = c.name, im_sum, "dropped mode 0 imaginary residual");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build_test_sim, E_TOL};
    use rand::prelude::*;

    fn random_mode(rng: &mut StdRng, n: usize, real: bool) -> Vec<Complex<Float>> {
        (0..n)
            .map(|_| {
                let re: Float = rng.gen_range(-1.0..1.0);
                let im: Float = if real { 0.0 } else { rng.gen_range(-1.0..1.0) };
                Complex::new(re, im)
            })
            .collect()
    }

    fn max_err(a: &[Complex<Float>], b: &[Complex<Float>]) -> Float {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, Float::max)
    }

    #[test]
    fn scalar_roundtrip() {
        let sim = build_test_sim();
        let mut transform = SpectralTransform::new(&sim.geom).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut fld = Field::new("rho", &sim.geom);
        for m in 0..fld.n_modes() {
            fld.spatial[m] = random_mode(&mut rng, fld.dim().len(), m == 0);
        }
        let input = fld.spatial.clone();
        transform.scalar_to_spectral(&mut fld);
        // check that the value has changed
        assert!(max_err(&fld.spectral[1][..input[1].len()], &input[1]) > 1E-3);
        transform.scalar_to_real(&mut fld);
        for m in 0..fld.n_modes() {
            assert!(max_err(&fld.spatial[m], &input[m]) < E_TOL);
        }
    }

    #[test]
    fn vector_roundtrip_with_padding() {
        let mut cfg = crate::build_test_config();
        cfg.grid.z_padding = 6;
        cfg.grid.nm = 3;
        let sim = crate::Sim::new(&cfg).unwrap();
        assert_eq!(sim.geom.nz_spectral, sim.geom.nz + 6);
        let mut transform = SpectralTransform::new(&sim.geom).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut v = VecField::new(["er", "et", "ez"], &sim.geom);
        for c in v.components_mut() {
            for m in 0..c.n_modes() {
                c.spatial[m] = random_mode(&mut rng, c.dim().len(), m == 0);
            }
        }
        let input: Vec<_> = v.components().iter().map(|c| c.spatial.clone()).collect();
        transform.vector_to_spectral(&mut v);
        transform.vector_to_real(&mut v);
        for (c, orig) in v.components().iter().zip(&input) {
            for m in 0..c.n_modes() {
                assert!(max_err(&c.spatial[m], &orig[m]) < E_TOL);
            }
        }
    }

    #[test]
    fn single_coefficient_is_bessel_times_plane_wave() {
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut transform = SpectralTransform::new(geom).unwrap();
        let mut fld = Field::new("bz", geom);
        let (n, q) = (2, 3);
        let idx = n * geom.nz_spectral + q;
        fld.spectral[1][idx] = Complex::new(1.0, 0.0);
        transform.scalar_to_real(&mut fld);
        let kr = transform.kr(1)[n];
        let kz = 2.0 * crate::consts::PI * q as Float / (geom.nz_spectral as Float * geom.dz);
        for ir in 0..geom.nr {
            for iz in 0..geom.nz {
                // the FFT phase is measured from the first cell
                let phase = kz * iz as Float * geom.dz;
                let expected = Complex::from_polar(
                    crate::flds::bessel::jn(1, kr * geom.r(ir)) / geom.nz_spectral as Float,
                    phase,
                );
                assert!((fld.at(1, ir, iz) - expected).norm() < 1E-14);
            }
        }
    }
}
