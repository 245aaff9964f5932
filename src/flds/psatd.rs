//! Pseudo-spectral analytical time-domain integration of Maxwell's
//! equations, one azimuthal mode at a time.
//!
//! Every (kr, kz) point is advanced with the exact vacuum solution
//! (rotation at omega = c|k|) plus the analytic integral of the current,
//! taken constant or linear over the step.
use crate::consts::{C, EPSILON_0};
use crate::flds::continuity::divergence;
use crate::flds::field::{SpectralRef, SpectralVec};
use crate::flds::wave_num::WaveNumbers;
use crate::Float;
use rustfft::num_complex::Complex;
use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CurrentOrder {
    /// J constant over the step, deposited at mid-step positions.
    #[default]
    Constant,
    /// J linear between the values deposited at both ends of the step.
    Linear,
}

// Below this value of omega*dt the coefficients switch to their Taylor
// series, which avoids the cancellation in 1 - cos and dt - sin/omega.
const SMALL_WDT: Float = 1E-2;

/// Time-integration coefficients for one mode.
pub struct PsatdCoefs {
    cos: Vec<Float>,
    // sin(w dt) / w
    s_w: Vec<Float>,
    // (1 - cos) / w^2
    a1: Vec<Float>,
    // (dt - s_w) / w^2
    a2: Vec<Float>,
}

impl PsatdCoefs {
    pub fn new(k: &WaveNumbers, dt: Float) -> PsatdCoefs {
        let n = k.k_mag.len();
        let mut coefs = PsatdCoefs {
            cos: Vec::with_capacity(n),
            s_w: Vec::with_capacity(n),
            a1: Vec::with_capacity(n),
            a2: Vec::with_capacity(n),
        };
        for k_mag in &k.k_mag {
            let w = C * k_mag;
            let x = w * dt;
            let cos = x.cos();
            let (s_w, a1, a2) = if x < SMALL_WDT {
                let x2 = x * x;
                (
                    dt * (1.0 - x2 / 6.0 + x2 * x2 / 120.0),
                    dt * dt * (0.5 - x2 / 24.0 + x2 * x2 / 720.0),
                    dt * dt * dt * (1.0 / 6.0 - x2 / 120.0 + x2 * x2 / 5040.0),
                )
            } else {
                let s_w = x.sin() / w;
                (s_w, (1.0 - cos) / (w * w), (dt - s_w) / (w * w))
            };
            coefs.cos.push(cos);
            coefs.s_w.push(s_w);
            coefs.a1.push(a1);
            coefs.a2.push(a2);
        }
        coefs
    }
}

/// (curl A)+ = -i kr/2 Az + kz A+, (curl A)- = -i kr/2 Az - kz A-,
/// (curl A)z = i kr (A+ + A-)
#[inline(always)]
pub fn curl(
    kz: Float,
    kr: Float,
    p: Complex<Float>,
    m: Complex<Float>,
    z: Complex<Float>,
) -> (Complex<Float>, Complex<Float>, Complex<Float>) {
    let half = Complex::new(0.0, 0.5 * kr) * z;
    (-half + p * kz, -half - m * kz, Complex::new(0.0, kr) * (p + m))
}

pub struct Psatd {
    pub order: CurrentOrder,
    dt: Float,
    coefs: Vec<PsatdCoefs>,
}

impl Psatd {
    pub fn new(k: &[WaveNumbers], dt: Float, order: CurrentOrder) -> Psatd {
        Psatd {
            order,
            dt,
            coefs: k.iter().map(|k| PsatdCoefs::new(k, dt)).collect(),
        }
    }

    /// Advance E and B of mode `m` by one step. `j0` is the current at the
    /// start of the step and is only read with `CurrentOrder::Linear`.
    #[allow(clippy::too_many_arguments)]
    pub fn push_mode(
        &self,
        m: usize,
        k: &WaveNumbers,
        e: SpectralVec,
        b: SpectralVec,
        j: SpectralRef,
        j0: Option<SpectralRef>,
        rho_prev: &[Complex<Float>],
        rho_next: &[Complex<Float>],
    ) {
        match self.order {
            CurrentOrder::Constant => self.push_constant(m, k, e, b, j, rho_prev, rho_next),
            CurrentOrder::Linear => self.push_linear(m, k, e, b, j0.unwrap_or(j), j),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn push_constant(
        &self,
        m: usize,
        k: &WaveNumbers,
        e: SpectralVec,
        b: SpectralVec,
        j: SpectralRef,
        rho_prev: &[Complex<Float>],
        rho_next: &[Complex<Float>],
    ) {
        let coefs = &self.coefs[m];
        let inv_dt = 1.0 / self.dt;
        let c2 = C * C;
        let inv_eps0 = 1.0 / EPSILON_0;
        // mu0 c^2 = 1/eps0
        let mu0_c2 = inv_eps0;
        let i = Complex::<Float>::i();
        for idx in 0..k.k_norm.len() {
            let kz = k.k_z[idx];
            let kr = k.k_r[idx];
            let cos = coefs.cos[idx];
            let s_w = coefs.s_w[idx];
            let a1 = coefs.a1[idx];
            let a2_dt = coefs.a2[idx] * inv_dt;

            let (ep, em, ez) = (e.p[idx], e.m[idx], e.z[idx]);
            let (bp, bm, bz) = (b.p[idx], b.m[idx], b.z[idx]);
            let (jp, jm, jz) = (j.p[idx], j.m[idx], j.z[idx]);

            // c^2/(eps0 w^2) [rho_next (1 - S/dt) - rho_prev (C - S/dt)]
            let rho_diff = (rho_next[idx] * a2_dt - rho_prev[idx] * (a2_dt - a1)) * (c2 * inv_eps0);
            let (cb_p, cb_m, cb_z) = curl(kz, kr, bp, bm, bz);
            let (ce_p, ce_m, ce_z) = curl(kz, kr, ep, em, ez);
            let (cj_p, cj_m, cj_z) = curl(kz, kr, jp, jm, jz);

            e.p[idx] = ep * cos + rho_diff * (0.5 * kr) + (cb_p * c2 - jp * mu0_c2) * s_w;
            e.m[idx] = em * cos - rho_diff * (0.5 * kr) + (cb_m * c2 - jm * mu0_c2) * s_w;
            e.z[idx] = ez * cos - i * kz * rho_diff + (cb_z * c2 - jz * mu0_c2) * s_w;

            let j_coef = a1 * inv_eps0;
            b.p[idx] = bp * cos - ce_p * s_w + cj_p * j_coef;
            b.m[idx] = bm * cos - ce_m * s_w + cj_m * j_coef;
            b.z[idx] = bz * cos - ce_z * s_w + cj_z * j_coef;
        }
    }

    fn push_linear(
        &self,
        m: usize,
        k: &WaveNumbers,
        e: SpectralVec,
        b: SpectralVec,
        j0: SpectralRef,
        j1: SpectralRef,
    ) {
        let coefs = &self.coefs[m];
        let dt = self.dt;
        let inv_dt = 1.0 / dt;
        let c2 = C * C;
        let inv_eps0 = 1.0 / EPSILON_0;
        for idx in 0..k.k_norm.len() {
            let kz = k.k_z[idx];
            let kr = k.k_r[idx];
            let norm = k.k_norm[idx];
            let cos = coefs.cos[idx];
            let s_w = coefs.s_w[idx];
            let a1 = coefs.a1[idx];
            let a2 = coefs.a2[idx];

            let (ep, em, ez) = (e.p[idx], e.m[idx], e.z[idx]);
            let (bp, bm, bz) = (b.p[idx], b.m[idx], b.z[idx]);
            let j0v = [j0.p[idx], j0.m[idx], j0.z[idx]];
            let dj = [j1.p[idx] - j0v[0], j1.m[idx] - j0v[1], j1.z[idx] - j0v[2]];

            // Transverse source integral and the B source, both vectors.
            let q: [Complex<Float>; 3] = std::array::from_fn(|c| j0v[c] * s_w + dj[c] * (a1 * inv_dt));
            let jb: [Complex<Float>; 3] = std::array::from_fn(|c| j0v[c] * a1 + dj[c] * (a2 * inv_dt));

            // The longitudinal part of E does not rotate: it only integrates
            // the mean current. D collects everything projected on grad.
            let div_e = divergence(kz, kr, ep, em, ez);
            let div_q = divergence(kz, kr, q[0], q[1], q[2]);
            let div_sum = divergence(kz, kr, j0v[0] * 2.0 + dj[0], j0v[1] * 2.0 + dj[1], j0v[2] * 2.0 + dj[2]);
            let d = (div_e * (1.0 - cos) + (div_q - div_sum * (0.5 * dt)) * inv_eps0) * norm;
            // L(X) = -grad(div X / k^2)
            let l_p = d * (0.5 * kr);
            let l_m = -d * (0.5 * kr);
            let l_z = Complex::new(0.0, -kz) * d;

            let (cb_p, cb_m, cb_z) = curl(kz, kr, bp, bm, bz);
            let (ce_p, ce_m, ce_z) = curl(kz, kr, ep, em, ez);
            let (cj_p, cj_m, cj_z) = curl(kz, kr, jb[0], jb[1], jb[2]);

            e.p[idx] = ep * cos + cb_p * (c2 * s_w) - q[0] * inv_eps0 + l_p;
            e.m[idx] = em * cos + cb_m * (c2 * s_w) - q[1] * inv_eps0 + l_m;
            e.z[idx] = ez * cos + cb_z * (c2 * s_w) - q[2] * inv_eps0 + l_z;

            b.p[idx] = bp * cos - ce_p * s_w + cj_p * inv_eps0;
            b.m[idx] = bm * cos - ce_m * s_w + cj_m * inv_eps0;
            b.z[idx] = bz * cos - ce_z * s_w + cj_z * inv_eps0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_sim;
    use crate::flds::transform::SpectralTransform;
    use num_traits::Zero;
    use rand::prelude::*;

    fn random(rng: &mut StdRng, n: usize, scale: Float) -> Vec<Complex<Float>> {
        (0..n)
            .map(|_| Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)) * scale)
            .collect()
    }

    #[test]
    fn coefficients_are_continuous_across_taylor_switch() {
        let sim = build_test_sim();
        let transform = SpectralTransform::new(&sim.geom).unwrap();
        let k = WaveNumbers::new(&sim.geom, &transform, 0);
        let i = 1;
        let w = C * k.k_mag[i];
        // pick a timestep on each side of the switch for the same k
        let below = PsatdCoefs::new(&k, 0.999 * SMALL_WDT / w);
        let above = PsatdCoefs::new(&k, 1.001 * SMALL_WDT / w);
        let rel = |a: Float, b: Float| ((a - b) / b).abs();
        assert!(rel(below.s_w[i] / 0.999, above.s_w[i] / 1.001) < 1E-5);
        assert!(rel(below.a1[i] / 0.999f64.powi(2), above.a1[i] / 1.001f64.powi(2)) < 1E-5);
        // k = 0 takes the series and stays finite
        assert_eq!(below.cos[0], 1.0);
        assert_eq!(above.s_w[0], 1.001 * SMALL_WDT / w);
    }

    #[test]
    fn vacuum_push_preserves_gauss_law() {
        // Start from a divergence-free E, push once with zero sources, and
        // check div E stays zero at every spectral point.
        let sim = build_test_sim();
        let geom = &sim.geom;
        let transform = SpectralTransform::new(geom).unwrap();
        let k = WaveNumbers::new(geom, &transform, 1);
        let n = k.k_norm.len();
        let psatd = Psatd::new(std::slice::from_ref(&k), geom.dt, CurrentOrder::Constant);
        let zero = vec![Complex::zero(); n];
        let mut ep = vec![Complex::new(1.0, 0.0); n];
        let mut em = vec![Complex::new(1.0, 0.0); n];
        let mut ez = vec![Complex::zero(); n];
        let mut bp = vec![Complex::new(0.0, 2.0); n];
        let mut bm = vec![Complex::new(0.5, 0.0); n];
        let mut bz = vec![Complex::zero(); n];
        psatd.push_mode(
            0,
            &k,
            SpectralVec {
                p: &mut ep,
                m: &mut em,
                z: &mut ez,
            },
            SpectralVec {
                p: &mut bp,
                m: &mut bm,
                z: &mut bz,
            },
            SpectralRef {
                p: &zero,
                m: &zero,
                z: &zero,
            },
            None,
            &zero,
            &zero,
        );
        for idx in 0..n {
            let div = divergence(k.k_z[idx], k.k_r[idx], ep[idx], em[idx], ez[idx]);
            let scale = k.k_mag[idx] * (ep[idx].norm() + em[idx].norm() + ez[idx].norm());
            assert!(div.norm() <= 1E-12 * scale);
        }
    }

    #[test]
    fn linear_matches_constant_for_a_steady_current() {
        // With J0 = J1, rho_next - rho_prev = -dt div J and div E = rho/eps0
        // both integrators solve the same problem.
        let sim = build_test_sim();
        let geom = &sim.geom;
        let transform = SpectralTransform::new(geom).unwrap();
        let k = WaveNumbers::new(geom, &transform, 1);
        let n = k.k_mag.len();
        let dt = geom.dt;
        let mut rng = StdRng::seed_from_u64(5);
        let e0 = [random(&mut rng, n, 1.0), random(&mut rng, n, 1.0), random(&mut rng, n, 1.0)];
        let b0 = [random(&mut rng, n, 1.0 / C), random(&mut rng, n, 1.0 / C), random(&mut rng, n, 1.0 / C)];
        let j = [
            random(&mut rng, n, EPSILON_0 / dt),
            random(&mut rng, n, EPSILON_0 / dt),
            random(&mut rng, n, EPSILON_0 / dt),
        ];
        let mut rho_prev = vec![Complex::zero(); n];
        let mut rho_next = vec![Complex::zero(); n];
        for idx in 0..n {
            let (kz, kr) = (k.k_z[idx], k.k_r[idx]);
            rho_prev[idx] = divergence(kz, kr, e0[0][idx], e0[1][idx], e0[2][idx]) * EPSILON_0;
            rho_next[idx] = rho_prev[idx] - divergence(kz, kr, j[0][idx], j[1][idx], j[2][idx]) * dt;
        }
        let j_ref = SpectralRef {
            p: &j[0],
            m: &j[1],
            z: &j[2],
        };

        let push = |order: CurrentOrder| {
            let psatd = Psatd::new(std::slice::from_ref(&k), dt, order);
            let (mut e, mut b) = (e0.clone(), b0.clone());
            {
                let [ep, em, ez] = &mut e;
                let [bp, bm, bz] = &mut b;
                psatd.push_mode(
                    0,
                    &k,
                    SpectralVec { p: ep, m: em, z: ez },
                    SpectralVec { p: bp, m: bm, z: bz },
                    j_ref,
                    Some(j_ref),
                    &rho_prev,
                    &rho_next,
                );
            }
            (e, b)
        };
        let (e_const, b_const) = push(CurrentOrder::Constant);
        let (e_lin, b_lin) = push(CurrentOrder::Linear);
        for c in 0..3 {
            for idx in 0..n {
                assert!((e_lin[c][idx] - e_const[c][idx]).norm() < 1E-10);
                assert!((b_lin[c][idx] - b_const[c][idx]).norm() * C < 1E-10);
            }
        }
    }
}
