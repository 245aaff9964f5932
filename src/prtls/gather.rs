//! Field interpolation at particle positions, and the momentum push that
//! consumes it.
use crate::backend::Backend;
use crate::consts::E_CHARGE;
use crate::flds::field::{Field, FieldDim, Pos, VecField};
use crate::geometry::Geometry;
use crate::prtls::deposit::{axial_cell, azimuth, mode_phases, radial_cell, stencils, Parity};
use crate::prtls::push::PushCoefs;
use crate::prtls::shape::{ShapeOrder, Stencil};
use crate::prtls::Species;
use crate::{Float, PRTL_CHUNK_SIZE};
use num_traits::Zero;
use rustfft::num_complex::Complex;

/// Sum the mode coefficients of `fld` over the stencil, mode by mode.
#[inline(always)]
fn interpolate(
    fld: &Field,
    dim: FieldDim,
    geom: &Geometry,
    sz: &Stencil,
    sr: &Stencil,
    parity: Parity,
    out: &mut [Complex<Float>],
) {
    for (ir, wr) in sr.iter() {
        let (ir, folded) = match radial_cell(ir, geom.nr) {
            Some(cell) => cell,
            // the field vanishes beyond rmax
            None => continue,
        };
        for (iz, wz) in sz.iter() {
            let iz = match axial_cell(iz, geom) {
                Some(iz) => iz,
                // nothing beyond an open z boundary
                None => continue,
            };
            let idx = dim.get_index(Pos { row: ir, col: iz });
            let w = wr * wz;
            for (m, o) in out.iter_mut().enumerate() {
                let mut f = w;
                if folded {
                    f *= parity.fold_sign(m);
                }
                *o += fld.spatial[m][idx] * f;
            }
        }
    }
}

/// Re F_0 + 2 sum_m Re[F_m e^{-im theta}]
#[inline(always)]
fn reconstruct(modes: &[Complex<Float>], phase: &[Complex<Float>]) -> Float {
    modes
        .iter()
        .zip(phase)
        .enumerate()
        .map(|(m, (f, p))| {
            let v = (f * p.conj()).re;
            if m == 0 {
                v
            } else {
                2.0 * v
            }
        })
        .sum()
}

/// Cartesian value of a cylindrical vector field at (x, y, z).
pub fn gather_vector(
    v: &VecField,
    geom: &Geometry,
    shape: ShapeOrder,
    x: Float,
    y: Float,
    z: Float,
) -> [Float; 3] {
    let (r, cos, sin) = azimuth(x, y);
    let (sz, sr) = stencils(geom, shape, z, r);
    let phase = mode_phases(cos, sin, geom.nm);
    let dim = v.r.dim();
    let nm = geom.nm;

    let mut fr = [Complex::zero(); crate::MAX_MODES];
    let mut ft = [Complex::zero(); crate::MAX_MODES];
    let mut fz = [Complex::zero(); crate::MAX_MODES];
    interpolate(&v.r, dim, geom, &sz, &sr, Parity::Odd, &mut fr[..nm]);
    interpolate(&v.t, dim, geom, &sz, &sr, Parity::Odd, &mut ft[..nm]);
    interpolate(&v.z, dim, geom, &sz, &sr, Parity::Even, &mut fz[..nm]);

    let f_r = reconstruct(&fr[..nm], &phase[..nm]);
    let f_t = reconstruct(&ft[..nm], &phase[..nm]);
    [
        cos * f_r - sin * f_t,
        sin * f_r + cos * f_t,
        reconstruct(&fz[..nm], &phase[..nm]),
    ]
}

/// Value of a scalar field at (x, y, z).
pub fn gather_scalar(
    fld: &Field,
    geom: &Geometry,
    shape: ShapeOrder,
    x: Float,
    y: Float,
    z: Float,
) -> Float {
    let (r, cos, sin) = azimuth(x, y);
    let (sz, sr) = stencils(geom, shape, z, r);
    let phase = mode_phases(cos, sin, geom.nm);
    let mut f = [Complex::zero(); crate::MAX_MODES];
    interpolate(fld, fld.dim(), geom, &sz, &sr, Parity::Even, &mut f[..geom.nm]);
    reconstruct(&f[..geom.nm], &phase[..geom.nm])
}

/// Gather E and B at every live particle and advance its momentum by `dt`.
pub fn gather_and_push(
    species: &mut Species,
    e: &VecField,
    b: &VecField,
    geom: &Geometry,
    shape: ShapeOrder,
    backend: &Backend,
    dt: Float,
) {
    let coefs = PushCoefs::new(species.charge, species.mass, dt);
    let pusher = species.pusher;
    let mass = species.mass;
    let mut chunks = species.chunks_mut(PRTL_CHUNK_SIZE);
    backend.for_each_chunk_mut(&mut chunks, 1, |_, chunk| {
        for c in chunk.iter_mut() {
            for i in 0..c.len() {
                if !c.alive[i] {
                    continue;
                }
                let coefs = match &c.level {
                    Some(level) => PushCoefs::new(E_CHARGE * level[i] as Float, mass, dt),
                    None => coefs,
                };
                let ef = gather_vector(e, geom, shape, c.x[i], c.y[i], c.z[i]);
                let bf = gather_vector(b, geom, shape, c.x[i], c.y[i], c.z[i]);
                let mut u = [c.ux[i], c.uy[i], c.uz[i]];
                c.inv_gamma[i] = pusher.push(&mut u, ef, bf, coefs);
                c.ux[i] = u[0];
                c.uy[i] = u[1];
                c.uz[i] = u[2];
            }
        }
    });
}

/// Move every live particle of `species` for `dt`.
pub fn push_positions(species: &mut Species, backend: &Backend, dt: Float) {
    let mut chunks = species.chunks_mut(PRTL_CHUNK_SIZE);
    backend.for_each_chunk_mut(&mut chunks, 1, |_, chunk| {
        for c in chunk.iter_mut() {
            c.push_positions(dt);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_sim;
    use crate::consts::M_E;
    use crate::prtls::deposit::deposit_rho;
    use crate::prtls::NewPrtl;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_transverse_field_is_recovered() {
        // A uniform Ex lives in mode 1 as Er = Ex/2, Et = -i Ex/2.
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut e = VecField::new(["er", "et", "ez"], geom);
        let ex = 3.0;
        for v in e.r.spatial[1].iter_mut() {
            *v = Complex::new(0.5 * ex, 0.0);
        }
        for v in e.t.spatial[1].iter_mut() {
            *v = Complex::new(0.0, -0.5 * ex);
        }
        for (x, y) in [(2.3e-6, 1.1e-6), (-4.0e-6, 0.7e-6), (0.3e-6, -0.2e-6)] {
            let f = gather_vector(&e, geom, ShapeOrder::Quadratic, x, y, 7.2e-6);
            assert_relative_eq!(f[0], ex, max_relative = 1E-12);
            assert!(f[1].abs() < 1E-12);
            assert_eq!(f[2], 0.0);
        }
    }

    #[test]
    fn gather_uses_deposit_weights() {
        // Depositing one particle and gathering at its position with the
        // same shape gives the sum of squared weights over cell volumes.
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut sp = Species::new("e", -E_CHARGE, M_E, 0, false);
        sp.add(NewPrtl {
            x: 3.2e-6,
            y: 0.0,
            z: 6.1e-6,
            u: [0.0; 3],
            w: 1.0,
            level: 0,
        });
        let mut rho = Field::new("rho", geom);
        deposit_rho(&sp, geom, ShapeOrder::Linear, &Backend::Serial, &mut rho);
        let g = gather_scalar(&rho, geom, ShapeOrder::Linear, 3.2e-6, 0.0, 6.1e-6);
        let (sz, sr) = stencils(geom, ShapeOrder::Linear, 6.1e-6, 3.2e-6);
        let mut expected = 0.0;
        for (ir, wr) in sr.iter() {
            for (_, wz) in sz.iter() {
                // modes 0 and 1 both contribute q S / V at theta = 0
                expected += 3.0 * (wr * wz).powi(2) * -E_CHARGE / geom.cell_volume(ir as usize);
            }
        }
        assert_relative_eq!(g, expected, max_relative = 1E-12);
    }
}
