//! Macro-particle storage. Each species keeps its particles in a
//! structure-of-arrays arena: removed particles leave a free slot that the
//! next insertion reuses, and the arena is compacted periodically.
use crate::config::SpeciesParams;
use crate::consts::{C, E_CHARGE, M_E};
use crate::geometry::Geometry;
use crate::prtls::push::PusherKind;
use crate::{Float, PRTL_CHUNK_SIZE};
use itertools::izip;

pub mod deposit;
pub mod gather;
pub mod injection;
pub mod ionization;
pub mod push;
pub mod shape;

/// A particle waiting to be written into an arena slot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewPrtl {
    pub x: Float,
    pub y: Float,
    pub z: Float,
    pub u: [Float; 3],
    pub w: Float,
    pub level: u8,
}

pub struct Species {
    pub name: String,
    /// Charge of one physical particle in C. Ionizable species carry
    /// `level * e` per particle instead.
    pub charge: Float,
    /// Mass of one physical particle in kg.
    pub mass: Float,
    pub pusher: PusherKind,
    pub continuous_injection: bool,
    pub x: Vec<Float>,
    pub y: Vec<Float>,
    pub z: Vec<Float>,
    pub ux: Vec<Float>,
    pub uy: Vec<Float>,
    pub uz: Vec<Float>,
    pub inv_gamma: Vec<Float>, // Lorentz Factors
    pub w: Vec<Float>,
    pub level: Option<Vec<u8>>,
    alive: Vec<bool>,
    free: Vec<usize>,
    n_alive: usize,
    growths: usize,
}

/// Mutable view of a contiguous range of arena slots. `offset` is the
/// index of the first slot in the arena.
pub struct PrtlChunk<'a> {
    pub offset: usize,
    pub x: &'a mut [Float],
    pub y: &'a mut [Float],
    pub z: &'a mut [Float],
    pub ux: &'a mut [Float],
    pub uy: &'a mut [Float],
    pub uz: &'a mut [Float],
    pub inv_gamma: &'a mut [Float],
    pub w: &'a [Float],
    pub alive: &'a [bool],
    pub level: Option<&'a mut [u8]>,
}

impl<'a> PrtlChunk<'a> {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Move every live particle for `dt` at its current velocity.
    pub fn push_positions(&mut self, dt: Float) {
        for (x, y, z, ux, uy, uz, inv_gamma, alive) in izip!(
            self.x.iter_mut(),
            self.y.iter_mut(),
            self.z.iter_mut(),
            self.ux.iter(),
            self.uy.iter(),
            self.uz.iter(),
            self.inv_gamma.iter(),
            self.alive.iter()
        ) {
            if !alive {
                continue;
            }
            let c1 = C * dt * inv_gamma;
            *x += c1 * ux;
            *y += c1 * uy;
            *z += c1 * uz;
        }
    }
}

impl Species {
    pub fn new(name: &str, charge: Float, mass: Float, capacity: usize, ionizable: bool) -> Species {
        Species {
            name: name.to_string(),
            charge,
            mass,
            pusher: PusherKind::default(),
            continuous_injection: false,
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            ux: Vec::with_capacity(capacity),
            uy: Vec::with_capacity(capacity),
            uz: Vec::with_capacity(capacity),
            inv_gamma: Vec::with_capacity(capacity),
            w: Vec::with_capacity(capacity),
            level: if ionizable {
                Some(Vec::with_capacity(capacity))
            } else {
                None
            },
            alive: Vec::with_capacity(capacity),
            free: Vec::new(),
            n_alive: 0,
            growths: 0,
        }
    }

    /// Charge and mass in the config are in units of e and m_e.
    pub fn from_params(params: &SpeciesParams) -> Species {
        let mut species = Species::new(
            &params.name,
            params.charge * E_CHARGE,
            params.mass * M_E,
            params.capacity.unwrap_or(0),
            params.ionization.is_some(),
        );
        species.pusher = params.pusher;
        species.continuous_injection = params.continuous_injection;
        species
    }

    /// Number of slots, live or not.
    pub fn n_slots(&self) -> usize {
        self.x.len()
    }

    pub fn n_alive(&self) -> usize {
        self.n_alive
    }

    pub fn capacity(&self) -> usize {
        self.x.capacity()
    }

    pub fn is_alive(&self, i: usize) -> bool {
        self.alive[i]
    }

    pub fn alive(&self) -> &[bool] {
        &self.alive
    }

    /// Charge of the physical particles represented by slot `i`, not
    /// multiplied by the weight.
    #[inline(always)]
    pub fn particle_charge(&self, i: usize) -> Float {
        match &self.level {
            Some(level) => E_CHARGE * level[i] as Float,
            None => self.charge,
        }
    }

    /// Number of arena reallocations since the last call.
    pub fn take_growths(&mut self) -> usize {
        std::mem::take(&mut self.growths)
    }

    fn grow(&mut self) {
        // Double the arena in one go so the count below is exact.
        let extra = self.capacity().max(PRTL_CHUNK_SIZE);
        self.x.reserve_exact(extra);
        self.y.reserve_exact(extra);
        self.z.reserve_exact(extra);
        self.ux.reserve_exact(extra);
        self.uy.reserve_exact(extra);
        self.uz.reserve_exact(extra);
        self.inv_gamma.reserve_exact(extra);
        self.w.reserve_exact(extra);
        if let Some(level) = self.level.as_mut() {
            level.reserve_exact(extra);
        }
        self.alive.reserve_exact(extra);
        self.growths += 1;
    }

    /// Store a particle, reusing a free slot when there is one. Returns the
    /// slot index.
    pub fn add(&mut self, p: NewPrtl) -> usize {
        let inv_gamma = (1.0 + p.u[0] * p.u[0] + p.u[1] * p.u[1] + p.u[2] * p.u[2])
            .sqrt()
            .powi(-1);
        self.n_alive += 1;
        if let Some(i) = self.free.pop() {
            self.x[i] = p.x;
            self.y[i] = p.y;
            self.z[i] = p.z;
            self.ux[i] = p.u[0];
            self.uy[i] = p.u[1];
            self.uz[i] = p.u[2];
            self.inv_gamma[i] = inv_gamma;
            self.w[i] = p.w;
            if let Some(level) = self.level.as_mut() {
                level[i] = p.level;
            }
            self.alive[i] = true;
            return i;
        }
        if self.x.len() == self.x.capacity() {
            self.grow();
        }
        self.x.push(p.x);
        self.y.push(p.y);
        self.z.push(p.z);
        self.ux.push(p.u[0]);
        self.uy.push(p.u[1]);
        self.uz.push(p.u[2]);
        self.inv_gamma.push(inv_gamma);
        self.w.push(p.w);
        if let Some(level) = self.level.as_mut() {
            level.push(p.level);
        }
        self.alive.push(true);
        self.x.len() - 1
    }

    pub fn extend<I: IntoIterator<Item = NewPrtl>>(&mut self, prtls: I) -> usize {
        let mut n = 0;
        for p in prtls {
            self.add(p);
            n += 1;
        }
        n
    }

    /// Free slot `i`. Its weight is zeroed so that nothing it still holds
    /// reaches the grid.
    pub fn remove(&mut self, i: usize) {
        if self.alive[i] {
            self.alive[i] = false;
            self.w[i] = 0.0;
            self.free.push(i);
            self.n_alive -= 1;
        }
    }

    /// Absorbing boundaries: remove every particle outside the grid.
    pub fn remove_outside(&mut self, geom: &Geometry) -> usize {
        let mut removed = 0;
        for i in 0..self.n_slots() {
            if !self.alive[i] {
                continue;
            }
            let r = self.x[i].hypot(self.y[i]);
            if !geom.contains(self.z[i], r) {
                self.remove(i);
                removed += 1;
            }
        }
        removed
    }

    /// Periodic z: bring every particle back into [zmin, zmax).
    pub fn wrap_z(&mut self, zmin: Float, zmax: Float) {
        let length = zmax - zmin;
        for (z, alive) in self.z.iter_mut().zip(&self.alive) {
            if *alive && (*z < zmin || *z >= zmax) {
                *z = zmin + (*z - zmin).rem_euclid(length);
            }
        }
    }

    /// Remove every particle with z below `z`.
    pub fn remove_behind(&mut self, z: Float) -> usize {
        let mut removed = 0;
        for i in 0..self.n_slots() {
            if self.alive[i] && self.z[i] < z {
                self.remove(i);
                removed += 1;
            }
        }
        removed
    }

    /// Drop the free slots, keeping the live particles in their order.
    pub fn compact(&mut self) {
        if self.free.is_empty() {
            return;
        }
        let alive = std::mem::take(&mut self.alive);
        let keep = |v: &mut Vec<Float>| {
            let mut it = alive.iter();
            v.retain(|_| *it.next().unwrap_or(&false));
        };
        keep(&mut self.x);
        keep(&mut self.y);
        keep(&mut self.z);
        keep(&mut self.ux);
        keep(&mut self.uy);
        keep(&mut self.uz);
        keep(&mut self.inv_gamma);
        keep(&mut self.w);
        if let Some(level) = self.level.as_mut() {
            let mut it = alive.iter();
            level.retain(|_| *it.next().unwrap_or(&false));
        }
        self.alive = vec![true; self.x.len()];
        self.free.clear();
        debug_assert_eq!(self.alive.len(), self.n_alive);
    }

    /// Split the arena into chunks of `chunk_size` slots.
    pub fn chunks_mut(&mut self, chunk_size: usize) -> Vec<PrtlChunk<'_>> {
        let n_chunks = (self.n_slots() + chunk_size - 1) / chunk_size;
        let levels: Vec<Option<&mut [u8]>> = match self.level.as_mut() {
            Some(level) => level.chunks_mut(chunk_size).map(Some).collect(),
            None => (0..n_chunks).map(|_| None).collect(),
        };
        izip!(
            self.x.chunks_mut(chunk_size),
            self.y.chunks_mut(chunk_size),
            self.z.chunks_mut(chunk_size),
            self.ux.chunks_mut(chunk_size),
            self.uy.chunks_mut(chunk_size),
            self.uz.chunks_mut(chunk_size),
            self.inv_gamma.chunks_mut(chunk_size),
            self.w.chunks(chunk_size),
            self.alive.chunks(chunk_size),
            levels
        )
        .enumerate()
        .map(
            |(i, (x, y, z, ux, uy, uz, inv_gamma, w, alive, level))| PrtlChunk {
                offset: i * chunk_size,
                x,
                y,
                z,
                ux,
                uy,
                uz,
                inv_gamma,
                w,
                alive,
                level,
            },
        )
        .collect()
    }

    /// Sum of q w over the live particles.
    pub fn total_charge(&self) -> Float {
        (0..self.n_slots())
            .filter(|&i| self.alive[i])
            .map(|i| self.particle_charge(i) * self.w[i])
            .sum()
    }

    /// Live particles whose momentum is not finite.
    pub fn count_nonfinite(&self) -> usize {
        izip!(&self.ux, &self.uy, &self.uz, &self.alive)
            .filter(|(ux, uy, uz, alive)| {
                **alive && !(ux.is_finite() && uy.is_finite() && uz.is_finite())
            })
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prtl(z: Float) -> NewPrtl {
        NewPrtl {
            x: 1E-6,
            y: 0.0,
            z,
            u: [0.0, 0.0, 1.0],
            w: 1.0,
            level: 0,
        }
    }

    #[test]
    fn free_slots_are_reused() {
        let mut sp = Species::new("e", -E_CHARGE, M_E, 4, false);
        for i in 0..4 {
            assert_eq!(sp.add(prtl(i as Float)), i);
        }
        sp.remove(1);
        assert_eq!(sp.n_alive(), 3);
        assert_eq!(sp.w[1], 0.0);
        assert_eq!(sp.add(prtl(9.0)), 1);
        assert_eq!(sp.n_slots(), 4);
        assert_eq!(sp.take_growths(), 0);
        assert!((sp.inv_gamma[1] - 0.5f64.sqrt()).abs() < 1E-15);
    }

    #[test]
    fn growth_is_counted_not_lost() {
        let mut sp = Species::new("e", -E_CHARGE, M_E, 2, false);
        for i in 0..10 {
            sp.add(prtl(i as Float));
        }
        assert_eq!(sp.n_alive(), 10);
        assert!(sp.take_growths() >= 1);
        assert_eq!(sp.take_growths(), 0);
        assert!((0..10).all(|i| sp.z[i] == i as Float));
    }

    #[test]
    fn compaction_keeps_order() {
        let mut sp = Species::new("ions", E_CHARGE, 1836.0 * M_E, 0, true);
        for i in 0..6 {
            sp.add(prtl(i as Float));
        }
        sp.remove(0);
        sp.remove(3);
        sp.compact();
        assert_eq!(sp.n_slots(), 4);
        assert_eq!(sp.z, vec![1.0, 2.0, 4.0, 5.0]);
        assert_eq!(sp.level.as_ref().map(|l| l.len()), Some(4));
        assert!(sp.alive().iter().all(|&a| a));
    }

    #[test]
    fn chunks_cover_arena() {
        let mut sp = Species::new("e", -E_CHARGE, M_E, 0, false);
        for i in 0..10 {
            sp.add(prtl(i as Float));
        }
        let chunks = sp.chunks_mut(4);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].offset, 8);
        assert_eq!(chunks[2].len(), 2);
    }

    #[test]
    fn ionizable_charge_follows_level() {
        let mut sp = Species::new("n", 0.0, 14.0 * 1836.0 * M_E, 0, true);
        let mut p = prtl(0.0);
        p.level = 3;
        p.w = 2.0;
        sp.add(p);
        assert!((sp.total_charge() - 6.0 * E_CHARGE).abs() < 1E-30);
    }
}
