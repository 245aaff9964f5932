//! Tunnel ionization with the ADK rate.
//!
//! Each ionizable macro-particle carries its ionization level. When it
//! ionizes, its level goes up by one and an electron with the same weight,
//! position and momentum is created in the target species.
use crate::backend::Backend;
use crate::flds::field::VecField;
use crate::geometry::Geometry;
use crate::prtls::gather::gather_vector;
use crate::prtls::shape::ShapeOrder;
use crate::prtls::{NewPrtl, Species};
use crate::{Float, PRTL_CHUNK_SIZE};
use rand::prelude::*;
use special::Gamma;

/// Atomic field, m_e^2 e^5 / ((4 pi eps0)^3 hbar^4), in V/m.
const E_ATOMIC: Float = 5.14220674763e11;
/// Atomic frequency, alpha^3 c / r_e, in 1/s.
const W_ATOMIC: Float = 4.1341373336e16;
/// Hydrogen ionization energy in eV.
const U_HYDROGEN: Float = 13.598434005136;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Element {
    H,
    He,
    N,
}

impl Element {
    pub fn from_symbol(symbol: &str) -> Option<Element> {
        match symbol {
            "H" => Some(Element::H),
            "He" => Some(Element::He),
            "N" => Some(Element::N),
            _ => None,
        }
    }

    pub fn atomic_number(self) -> usize {
        self.energies().len()
    }

    /// Successive ionization energies in eV.
    pub fn energies(self) -> &'static [Float] {
        match self {
            Element::H => &[13.59844],
            Element::He => &[24.58741, 54.41778],
            Element::N => &[14.5341, 29.6013, 47.44924, 77.4735, 97.8902, 552.0718, 667.046],
        }
    }
}

/// ADK constants of one ionization level, so that
/// ln w = ln_prefactor + power ln E + exp_prefactor / E.
#[derive(Clone, Copy, Debug)]
struct AdkLevel {
    ln_prefactor: Float,
    power: Float,
    exp_prefactor: Float,
}

pub struct Ionizer {
    pub element: Element,
    /// Index of the species receiving the electrons.
    pub target: usize,
    levels: Vec<AdkLevel>,
}

impl Ionizer {
    pub fn new(element: Element, target: usize) -> Ionizer {
        let energies = element.energies();
        // effective principal and orbital quantum numbers
        let n_eff: Vec<Float> = energies
            .iter()
            .enumerate()
            .map(|(i, u)| (i + 1) as Float * (U_HYDROGEN / u).sqrt())
            .collect();
        let l_eff = n_eff[0] - 1.0;
        let levels = energies
            .iter()
            .zip(&n_eff)
            .map(|(&u, &n)| {
                let c2 = (2.0 as Float).powf(2.0 * n) / (n * (n + l_eff + 1.0).gamma() * (n - l_eff).gamma());
                let u_rel = u / U_HYDROGEN;
                let power = -(2.0 * n - 1.0);
                let ln_prefactor = (W_ATOMIC * c2 * 0.5 * u_rel).ln()
                    + (2.0 * n - 1.0) * (2.0 * u_rel.powf(1.5) * E_ATOMIC).ln();
                AdkLevel {
                    ln_prefactor,
                    power,
                    exp_prefactor: -2.0 / 3.0 * u_rel.powf(1.5) * E_ATOMIC,
                }
            })
            .collect();
        Ionizer {
            element,
            target,
            levels,
        }
    }

    /// Ionization rate (1/s) of `level` in a field of magnitude `e_mag`.
    pub fn rate(&self, level: u8, e_mag: Float) -> Float {
        match self.levels.get(level as usize) {
            Some(adk) if e_mag > 0.0 => {
                (adk.ln_prefactor + adk.power * e_mag.ln() + adk.exp_prefactor / e_mag).exp()
            }
            _ => 0.0,
        }
    }

    /// Ionize at most one level per particle over `dt` and return the new
    /// electrons in slot order. The random stream of every chunk depends
    /// only on `seed`, `step` and the chunk index.
    #[allow(clippy::too_many_arguments)]
    pub fn ionize(
        &self,
        species: &mut Species,
        e: &VecField,
        geom: &Geometry,
        shape: ShapeOrder,
        backend: &Backend,
        dt: Float,
        seed: u64,
        step: u64,
    ) -> Vec<NewPrtl> {
        let mut chunks = species.chunks_mut(PRTL_CHUNK_SIZE);
        let n_chunks = chunks.len();
        let mut spawned: Vec<Vec<NewPrtl>> = (0..n_chunks).map(|_| Vec::new()).collect();
        let mut work: Vec<_> = chunks.drain(..).zip(spawned.iter_mut()).collect();
        backend.for_each_chunk_mut(&mut work, 1, |i, item| {
            for (c, out) in item.iter_mut() {
                let mut rng = StdRng::seed_from_u64(stream_seed(seed, step, i as u64));
                let level = match c.level.as_mut() {
                    Some(level) => level,
                    None => continue,
                };
                for p in 0..c.x.len() {
                    if !c.alive[p] {
                        continue;
                    }
                    let ef = gather_vector(e, geom, shape, c.x[p], c.y[p], c.z[p]);
                    let e_mag = (ef[0] * ef[0] + ef[1] * ef[1] + ef[2] * ef[2]).sqrt();
                    let w = self.rate(level[p], e_mag);
                    if w == 0.0 {
                        continue;
                    }
                    let prob = 1.0 - (-w * dt).exp();
                    if rng.gen::<Float>() < prob {
                        level[p] += 1;
                        out.push(NewPrtl {
                            x: c.x[p],
                            y: c.y[p],
                            z: c.z[p],
                            u: [c.ux[p], c.uy[p], c.uz[p]],
                            w: c.w[p],
                            level: 0,
                        });
                    }
                }
            }
        });
        drop(work);
        spawned.into_iter().flatten().collect()
    }
}

/// Mix the run seed, the step and the chunk index into one stream seed.
fn stream_seed(seed: u64, step: u64, chunk: u64) -> u64 {
    let mut h = seed ^ 0x9E37_79B9_7F4A_7C15;
    for v in [step, chunk] {
        h = (h ^ v).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h ^= h >> 31;
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_sim;
    use crate::consts::{E_CHARGE, M_E};
    use rustfft::num_complex::Complex;

    #[test]
    fn hydrogen_rate_is_sane() {
        let ion = Ionizer::new(Element::H, 0);
        // barrier suppression field of hydrogen is ~3e10 V/m
        let weak = ion.rate(0, 1e9);
        let strong = ion.rate(0, 3e10);
        assert!(weak >= 0.0 && weak < 1.0);
        assert!(strong > 1e12 && strong < 1e17);
        assert_eq!(ion.rate(1, 3e10), 0.0);
        assert_eq!(ion.rate(0, 0.0), 0.0);
    }

    #[test]
    fn levels_are_ordered() {
        let ion = Ionizer::new(Element::N, 0);
        let e = 1e11;
        // the K-shell levels do not ionize at all in this field
        for l in 0..5u8 {
            assert!(ion.rate(l, e) > ion.rate(l + 1, e));
        }
        assert_eq!(ion.rate(6, e), 0.0);
        assert_eq!(Element::from_symbol("He").map(|e| e.atomic_number()), Some(2));
        assert!(Element::from_symbol("Xe").is_none());
    }

    #[test]
    fn strong_field_ionizes_once_per_step() {
        let sim = build_test_sim();
        let geom = &sim.geom;
        let mut e = VecField::new(["er", "et", "ez"], geom);
        for v in e.z.spatial[0].iter_mut() {
            *v = Complex::new(1e13, 0.0);
        }
        let mut ions = Species::new("he", 0.0, 4.0 * 1836.0 * M_E, 0, true);
        for i in 0..20 {
            ions.add(NewPrtl {
                x: 1e-6 + 0.1e-6 * i as Float,
                y: 0.0,
                z: 4e-6,
                u: [0.0; 3],
                w: 3.0,
                level: 0,
            });
        }
        let ion = Ionizer::new(Element::He, 1);
        let electrons = ion.ionize(&mut ions, &e, geom, ShapeOrder::Linear, &Backend::Serial, 1e-15, 1, 0);
        assert_eq!(electrons.len(), 20);
        assert!(ions.level.as_ref().unwrap().iter().all(|&l| l == 1));
        assert!((ions.total_charge() - 60.0 * E_CHARGE).abs() < 1e-30);
        let again = ion.ionize(&mut ions, &e, geom, ShapeOrder::Linear, &Backend::Serial, 1e-15, 1, 1);
        assert_eq!(again.len(), 20);
        let done = ion.ionize(&mut ions, &e, geom, ShapeOrder::Linear, &Backend::Serial, 1e-15, 1, 2);
        assert!(done.is_empty());
        assert!(electrons.iter().all(|p| p.w == 3.0));
    }
}
