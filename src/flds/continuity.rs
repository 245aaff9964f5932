//! Charge continuity enforcement, chosen once per run.
use crate::consts::EPSILON_0;
use crate::flds::field::SpectralVec;
use crate::flds::wave_num::WaveNumbers;
use crate::Float;
use itertools::izip;
use rustfft::num_complex::Complex;
use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContinuityPolicy {
    /// Add a gradient to J every step so that
    /// (rho_next - rho_prev)/dt + div J = 0 holds exactly.
    CurlFreeCurrent,
    /// Use J as deposited and project E onto div E = rho/eps0 every
    /// `period` steps.
    GaussProjection { period: u32 },
}

impl Default for ContinuityPolicy {
    fn default() -> Self {
        ContinuityPolicy::CurlFreeCurrent
    }
}

/// div A = kr (A+ - A-) + i kz Az
#[inline(always)]
pub fn divergence(kz: Float, kr: Float, p: Complex<Float>, m: Complex<Float>, z: Complex<Float>) -> Complex<Float> {
    (p - m) * kr + Complex::new(0.0, kz) * z
}

/// Add grad(g) to A, with (grad g)+ = -kr/2 g, (grad g)- = kr/2 g,
/// (grad g)z = i kz g.
#[inline(always)]
fn add_gradient(
    kz: Float,
    kr: Float,
    g: Complex<Float>,
    p: &mut Complex<Float>,
    m: &mut Complex<Float>,
    z: &mut Complex<Float>,
) {
    *p -= g * (0.5 * kr);
    *m += g * (0.5 * kr);
    *z += Complex::new(0.0, kz) * g;
}

/// Make the currents satisfy continuity with the deposited charge. With a
/// linear-in-time current the correction keeps the step-averaged current
/// consistent and is added to both ends.
pub fn correct_currents(
    k: &WaveNumbers,
    dt: Float,
    rho_prev: &[Complex<Float>],
    rho_next: &[Complex<Float>],
    j: SpectralVec,
    j0: Option<SpectralVec>,
) {
    let inv_dt = 1.0 / dt;
    match j0 {
        None => {
            for (kz, kr, norm, rp, rn, p, m, z) in izip!(
                &k.k_z, &k.k_r, &k.k_norm, rho_prev, rho_next, j.p.iter_mut(), j.m.iter_mut(), j.z.iter_mut()
            ) {
                let g = ((rn - rp) * inv_dt + divergence(*kz, *kr, *p, *m, *z)) * *norm;
                add_gradient(*kz, *kr, g, p, m, z);
            }
        }
        Some(j0) => {
            for (i, (kz, kr, norm)) in izip!(&k.k_z, &k.k_r, &k.k_norm).enumerate() {
                let div_avg = 0.5
                    * (divergence(*kz, *kr, j.p[i], j.m[i], j.z[i])
                        + divergence(*kz, *kr, j0.p[i], j0.m[i], j0.z[i]));
                let g = ((rho_next[i] - rho_prev[i]) * inv_dt + div_avg) * *norm;
                add_gradient(*kz, *kr, g, &mut j.p[i], &mut j.m[i], &mut j.z[i]);
                add_gradient(*kz, *kr, g, &mut j0.p[i], &mut j0.m[i], &mut j0.z[i]);
            }
        }
    }
}

/// Remove the part of E that violates div E = rho / eps0.
pub fn project_gauss(k: &WaveNumbers, rho: &[Complex<Float>], e: SpectralVec) {
    let inv_eps0 = 1.0 / EPSILON_0;
    for (kz, kr, norm, rho, p, m, z) in izip!(
        &k.k_z, &k.k_r, &k.k_norm, rho, e.p.iter_mut(), e.m.iter_mut(), e.z.iter_mut()
    ) {
        let psi = (divergence(*kz, *kr, *p, *m, *z) - *rho * inv_eps0) * *norm;
        add_gradient(*kz, *kr, psi, p, m, z);
    }
}
