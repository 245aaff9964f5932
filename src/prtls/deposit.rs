//! Charge and current deposition onto the azimuthal modes of the grid.
//!
//! Particles are split in chunks of `PRTL_CHUNK_SIZE` slots. Every chunk is
//! deposited into its own buffer and the buffers are added to the grid in
//! chunk order, so the result does not depend on how many workers ran.
use crate::backend::Backend;
use crate::consts::C;
use crate::flds::field::{Field, FieldDim, Pos, VecField};
use crate::geometry::Geometry;
use crate::prtls::shape::{ShapeOrder, Stencil};
use crate::prtls::Species;
use crate::{Float, MAX_MODES, PRTL_CHUNK_SIZE};
use num_traits::Zero;
use rustfft::num_complex::Complex;

/// How a component transforms when a contribution is folded from the
/// ghost cell below the axis onto the first radial cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    /// Scalars and z components: (-1)^m.
    Even,
    /// r and theta components also flip direction: -(-1)^m.
    Odd,
}

impl Parity {
    #[inline(always)]
    pub fn fold_sign(self, m: usize) -> Float {
        let s = if m % 2 == 0 { 1.0 } else { -1.0 };
        match self {
            Parity::Even => s,
            Parity::Odd => -s,
        }
    }
}

/// e^{i m theta} for m in 0..nm.
#[inline(always)]
pub fn mode_phases(cos: Float, sin: Float, nm: usize) -> [Complex<Float>; MAX_MODES] {
    let mut phase = [Complex::zero(); MAX_MODES];
    let rot = Complex::new(cos, sin);
    let mut p = Complex::new(1.0, 0.0);
    for ph in phase.iter_mut().take(nm) {
        *ph = p;
        p *= rot;
    }
    phase
}

/// cos and sin of the azimuth of (x, y). On the axis the azimuth is taken
/// as zero.
#[inline(always)]
pub fn azimuth(x: Float, y: Float) -> (Float, Float, Float) {
    let r = x.hypot(y);
    if r > 0.0 {
        (r, x / r, y / r)
    } else {
        (0.0, 1.0, 0.0)
    }
}

/// The z and r stencils of a particle, in cell units of `geom`.
#[inline(always)]
pub fn stencils(geom: &Geometry, shape: ShapeOrder, z: Float, r: Float) -> (Stencil, Stencil) {
    let sz = shape.stencil((z - geom.zmin) / geom.dz - 0.5);
    let sr = shape.stencil(r / geom.dr - 0.5);
    (sz, sr)
}

/// Radial cell to write to, and whether the weight was folded across the
/// axis. `None` for cells beyond rmax.
#[inline(always)]
pub fn radial_cell(ir: isize, nr: usize) -> Option<(usize, bool)> {
    if ir < 0 {
        Some((0, true))
    } else if (ir as usize) < nr {
        Some((ir as usize, false))
    } else {
        None
    }
}

/// Axial cell to write to. A periodic grid wraps around; an open one drops
/// the stencil points beyond either end.
#[inline(always)]
pub fn axial_cell(iz: isize, geom: &Geometry) -> Option<usize> {
    if geom.periodic_z {
        Some(iz.rem_euclid(geom.nz as isize) as usize)
    } else if iz >= 0 && (iz as usize) < geom.nz {
        Some(iz as usize)
    } else {
        None
    }
}

/// One chunk's contribution to `n_comp` components over all modes, laid
/// out as [component][mode][cell].
struct ChunkBuffer {
    data: Vec<Complex<Float>>,
    nm: usize,
    len: usize,
}

impl ChunkBuffer {
    fn new(n_comp: usize, nm: usize, len: usize) -> ChunkBuffer {
        ChunkBuffer {
            data: vec![Complex::zero(); n_comp * nm * len],
            nm,
            len,
        }
    }

    #[inline(always)]
    fn slot(&mut self, comp: usize, m: usize, idx: usize) -> &mut Complex<Float> {
        &mut self.data[(comp * self.nm + m) * self.len + idx]
    }
}

/// Scatter one particle. `values` are the source densities before the shape
/// and volume factors, one per component.
#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn scatter<const N: usize>(
    buf: &mut ChunkBuffer,
    geom: &Geometry,
    dim: FieldDim,
    shape: ShapeOrder,
    x: Float,
    y: Float,
    z: Float,
    values: impl Fn(Float, Float) -> [Float; N],
    parity: [Parity; N],
) {
    let (r, cos, sin) = azimuth(x, y);
    let vals = values(cos, sin);
    let (sz, sr) = stencils(geom, shape, z, r);
    let phase = mode_phases(cos, sin, geom.nm);
    for (ir, wr) in sr.iter() {
        let (ir, folded) = match radial_cell(ir, geom.nr) {
            Some(cell) => cell,
            None => continue,
        };
        let wr = wr / geom.cell_volume(ir);
        for (iz, wz) in sz.iter() {
            let iz = match axial_cell(iz, geom) {
                Some(iz) => iz,
                None => continue,
            };
            let idx = dim.get_index(Pos { row: ir, col: iz });
            let w = wr * wz;
            for m in 0..geom.nm {
                let f = phase[m] * w;
                for c in 0..N {
                    let mut v = f * vals[c];
                    if folded {
                        v *= parity[c].fold_sign(m);
                    }
                    *buf.slot(c, m, idx) += v;
                }
            }
        }
    }
}

/// Deposit the chunks of `species` with `kernel` and add the result to
/// `out` in chunk order.
fn deposit_chunks<F>(
    species: &Species,
    geom: &Geometry,
    backend: &Backend,
    out: &mut [&mut Field],
    kernel: F,
) where
    F: Fn(&mut ChunkBuffer, usize) + Sync + Send,
{
    let n_comp = out.len();
    let len = geom.spatial_len();
    let n_chunks = (species.n_slots() + PRTL_CHUNK_SIZE - 1) / PRTL_CHUNK_SIZE;
    // Hold at most a few buffers per worker at a time. Adding them in chunk
    // order keeps the sum identical whatever the batch size.
    let batch = 2 * backend.n_workers();
    let mut first = 0;
    while first < n_chunks {
        let n = batch.min(n_chunks - first);
        let buffers = backend.map_indexed(n, |i| {
            let chunk = first + i;
            let mut buf = ChunkBuffer::new(n_comp, geom.nm, len);
            let start = chunk * PRTL_CHUNK_SIZE;
            let end = (start + PRTL_CHUNK_SIZE).min(species.n_slots());
            for p in start..end {
                if species.is_alive(p) {
                    kernel(&mut buf, p);
                }
            }
            buf
        });
        for buf in buffers {
            for (c, fld) in out.iter_mut().enumerate() {
                for m in 0..geom.nm {
                    let src = &buf.data[(c * geom.nm + m) * len..(c * geom.nm + m + 1) * len];
                    for (o, v) in fld.spatial[m].iter_mut().zip(src) {
                        *o += *v;
                    }
                }
            }
        }
        first += n;
    }
}

/// Add the charge density of `species` to `rho`.
pub fn deposit_rho(
    species: &Species,
    geom: &Geometry,
    shape: ShapeOrder,
    backend: &Backend,
    rho: &mut Field,
) {
    let dim = rho.dim();
    deposit_chunks(species, geom, backend, &mut [rho], |buf, p| {
        let q = species.particle_charge(p) * species.w[p];
        scatter(
            buf,
            geom,
            dim,
            shape,
            species.x[p],
            species.y[p],
            species.z[p],
            |_, _| [q],
            [Parity::Even],
        );
    });
}

/// Add the current density of `species` to `j`, using the current
/// positions and momenta.
pub fn deposit_current(
    species: &Species,
    geom: &Geometry,
    shape: ShapeOrder,
    backend: &Backend,
    j: &mut VecField,
) {
    let dim = j.r.dim();
    let VecField { r, t, z } = j;
    deposit_chunks(species, geom, backend, &mut [r, t, z], |buf, p| {
        let qv = species.particle_charge(p) * species.w[p] * C * species.inv_gamma[p];
        let (ux, uy, uz) = (species.ux[p], species.uy[p], species.uz[p]);
        scatter(
            buf,
            geom,
            dim,
            shape,
            species.x[p],
            species.y[p],
            species.z[p],
            |cos, sin| {
                [
                    qv * (cos * ux + sin * uy),
                    qv * (cos * uy - sin * ux),
                    qv * uz,
                ]
            },
            [Parity::Odd, Parity::Odd, Parity::Even],
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_sim;
    use crate::consts::{E_CHARGE, M_E};
    use crate::prtls::NewPrtl;

    fn grid_charge(rho: &Field, geom: &Geometry) -> Float {
        let mut total = 0.0;
        for ir in 0..geom.nr {
            for iz in 0..geom.nz {
                total += rho.at(0, ir, iz).re * geom.cell_volume(ir);
            }
        }
        total
    }

    #[test]
    fn charge_is_conserved_on_the_grid() {
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut sp = Species::new("e", -E_CHARGE, M_E, 0, false);
        // includes particles next to the axis and across the z wrap
        for (k, (x, z)) in [(0.1e-6, 3.3e-6), (2.7e-6, 0.2e-6), (4.4e-6, 15.9e-6), (0.0, 8.0e-6)]
            .iter()
            .enumerate()
        {
            sp.add(NewPrtl {
                x: *x,
                y: 0.3e-6 * k as Float,
                z: *z,
                u: [0.0; 3],
                w: 1E6,
                level: 0,
            });
        }
        for shape in [ShapeOrder::Linear, ShapeOrder::Quadratic] {
            let mut rho = Field::new("rho", geom);
            deposit_rho(&sp, geom, shape, &Backend::Serial, &mut rho);
            let expected = sp.total_charge();
            assert!((grid_charge(&rho, geom) - expected).abs() < 1E-12 * expected.abs());
        }
    }

    #[test]
    fn folded_mode_one_keeps_sign() {
        // A particle inside the first cell on the x axis: its mode 1
        // charge must be real and of the particle's sign in cell 0.
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut sp = Species::new("p", E_CHARGE, M_E, 0, false);
        sp.add(NewPrtl {
            x: 0.2 * geom.dr,
            y: 0.0,
            z: 5.5e-6,
            u: [0.0; 3],
            w: 1.0,
            level: 0,
        });
        let mut rho = Field::new("rho", geom);
        deposit_rho(&sp, geom, ShapeOrder::Linear, &Backend::Serial, &mut rho);
        let v0 = rho.at(0, 0, 5);
        let v1 = rho.at(1, 0, 5);
        assert!(v0.re > 0.0);
        assert!(v1.im.abs() < 1E-20 * v1.re.abs().max(1.0));
        // folding removes 0.3 of the weight from mode 1
        assert!((v1.re / v0.re - 0.4).abs() < 1E-12);
    }

    #[test]
    fn chunked_threads_match_serial() {
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut sp = Species::new("e", -E_CHARGE, M_E, 0, false);
        let n = 3 * PRTL_CHUNK_SIZE + 17;
        for i in 0..n {
            let a = i as Float * 0.618;
            sp.add(NewPrtl {
                x: 8e-6 * (a.fract() - 0.5),
                y: 8e-6 * ((a * 1.7).fract() - 0.5),
                z: 16e-6 * (a * 0.31).fract(),
                u: [a.sin(), a.cos(), 0.3],
                w: 1.0 + (a * 2.3).fract(),
                level: 0,
            });
        }
        let threads = Backend::new(&crate::config::BackendParams::Threads { n_threads: Some(3) }).unwrap();
        let mut j_serial = VecField::new(["jr", "jt", "jz"], geom);
        let mut j_threads = VecField::new(["jr", "jt", "jz"], geom);
        deposit_current(&sp, geom, ShapeOrder::Quadratic, &Backend::Serial, &mut j_serial);
        deposit_current(&sp, geom, ShapeOrder::Quadratic, &threads, &mut j_threads);
        for (a, b) in j_serial.components().iter().zip(j_threads.components().iter()) {
            assert_eq!(a.spatial, b.spatial);
        }
    }

    #[test]
    fn open_z_does_not_wrap_around() {
        let mut cfg = crate::build_test_config();
        cfg.grid.z_padding = 8;
        let sim = crate::Sim::new(&cfg).unwrap();
        let geom = &sim.geom;
        assert!(!geom.periodic_z);
        let mut sp = Species::new("e", -E_CHARGE, M_E, 0, false);
        sp.add(NewPrtl {
            x: 2.0 * geom.dr,
            y: 0.0,
            z: geom.zmax() - 0.1 * geom.dz,
            u: [0.0; 3],
            w: 1.0,
            level: 0,
        });
        let mut rho = Field::new("rho", geom);
        deposit_rho(&sp, geom, ShapeOrder::Quadratic, &Backend::Serial, &mut rho);
        for ir in 0..geom.nr {
            assert_eq!(rho.at(0, ir, 0), Complex::zero());
            assert_eq!(rho.at(0, ir, 1), Complex::zero());
        }
        assert!(rho.at(0, 2, geom.nz - 1).re < 0.0);

        // a field living only in the first cells is invisible from the far end
        let mut far = Field::new("rho", geom);
        for ir in 0..geom.nr {
            far.spatial[0][ir * geom.nz] = Complex::new(1.0, 0.0);
        }
        let x = sp.x[0];
        let z = sp.z[0];
        let v = crate::prtls::gather::gather_scalar(&far, geom, ShapeOrder::Quadratic, x, 0.0, z);
        assert_eq!(v, 0.0);
    }
}
