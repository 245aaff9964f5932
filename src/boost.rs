//! Lorentz boost along z between the lab frame and the simulation frame.
//!
//! The boost only acts where data enters or leaves the simulation: plasma
//! and laser initialisation, delayed particle injection and diagnostics.
use crate::consts::C;
use crate::prtls::NewPrtl;
use crate::Float;
use rustfft::num_complex::Complex;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoostConverter {
    pub gamma: Float,
    pub beta: Float,
}

/// A particle at a given time, in whatever frame the caller holds it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleEvent {
    pub t: Float,
    pub x: Float,
    pub y: Float,
    pub z: Float,
    pub u: [Float; 3],
}

impl BoostConverter {
    pub fn new(gamma: Float) -> BoostConverter {
        BoostConverter {
            gamma,
            beta: (1.0 - 1.0 / (gamma * gamma)).sqrt(),
        }
    }

    /// (t, z) in the lab to (t', z') in the boosted frame.
    pub fn event_to_boosted(&self, t: Float, z: Float) -> (Float, Float) {
        (
            self.gamma * (t - self.beta * z / C),
            self.gamma * (z - self.beta * C * t),
        )
    }

    pub fn event_to_lab(&self, t: Float, z: Float) -> (Float, Float) {
        (
            self.gamma * (t + self.beta * z / C),
            self.gamma * (z + self.beta * C * t),
        )
    }

    pub fn momentum_to_boosted(&self, u: [Float; 3]) -> [Float; 3] {
        self.boost_momentum(u, self.beta)
    }

    pub fn momentum_to_lab(&self, u: [Float; 3]) -> [Float; 3] {
        self.boost_momentum(u, -self.beta)
    }

    fn boost_momentum(&self, u: [Float; 3], beta: Float) -> [Float; 3] {
        let gamma_p = (1.0 + u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
        [u[0], u[1], self.gamma * (u[2] - beta * gamma_p)]
    }

    /// Longitudinal velocity seen from the boosted frame.
    pub fn velocity_to_boosted(&self, v: Float) -> Float {
        (v - self.beta * C) / (1.0 - self.beta * v / C)
    }

    pub fn particle_to_boosted(&self, p: &ParticleEvent) -> ParticleEvent {
        let (t, z) = self.event_to_boosted(p.t, p.z);
        ParticleEvent {
            t,
            z,
            u: self.momentum_to_boosted(p.u),
            ..*p
        }
    }

    pub fn particle_to_lab(&self, p: &ParticleEvent) -> ParticleEvent {
        let (t, z) = self.event_to_lab(p.t, p.z);
        ParticleEvent {
            t,
            z,
            u: self.momentum_to_lab(p.u),
            ..*p
        }
    }

    /// Cylindrical components (r, theta, z) of E and B at one point, lab to
    /// boosted. Works on mode amplitudes since the transform is linear.
    pub fn fields_to_boosted(
        &self,
        e: [Complex<Float>; 3],
        b: [Complex<Float>; 3],
    ) -> ([Complex<Float>; 3], [Complex<Float>; 3]) {
        self.boost_fields(e, b, self.beta * C)
    }

    pub fn fields_to_lab(
        &self,
        e: [Complex<Float>; 3],
        b: [Complex<Float>; 3],
    ) -> ([Complex<Float>; 3], [Complex<Float>; 3]) {
        self.boost_fields(e, b, -self.beta * C)
    }

    fn boost_fields(
        &self,
        e: [Complex<Float>; 3],
        b: [Complex<Float>; 3],
        v: Float,
    ) -> ([Complex<Float>; 3], [Complex<Float>; 3]) {
        let g = self.gamma;
        let [er, et, ez] = e;
        let [br, bt, bz] = b;
        (
            [g * (er - bt * v), g * (et + br * v), ez],
            [g * (br + et * (v / (C * C))), g * (bt - er * (v / (C * C))), bz],
        )
    }
}

struct Pending {
    species: usize,
    /// Boosted-frame time at which the particle enters.
    t: Float,
    prtl: NewPrtl,
}

/// Particles specified in the lab frame that enter the boosted simulation
/// at their own event time.
#[derive(Default)]
pub struct InjectionQueue {
    // sorted by decreasing t so the next one to enter is last
    pending: Vec<Pending>,
}

impl InjectionQueue {
    pub fn new() -> InjectionQueue {
        InjectionQueue::default()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue `prtl`, given at lab time `t_lab`, for `species`.
    pub fn push_lab(&mut self, boost: &BoostConverter, species: usize, t_lab: Float, prtl: NewPrtl) {
        let ev = boost.particle_to_boosted(&ParticleEvent {
            t: t_lab,
            x: prtl.x,
            y: prtl.y,
            z: prtl.z,
            u: prtl.u,
        });
        let entry = Pending {
            species,
            t: ev.t,
            prtl: NewPrtl {
                x: ev.x,
                y: ev.y,
                z: ev.z,
                u: ev.u,
                ..prtl
            },
        };
        let at = self.pending.partition_point(|p| p.t > entry.t);
        self.pending.insert(at, entry);
    }

    /// Pop every particle whose event time is not after `t`, moved
    /// ballistically from its event time to `t`.
    pub fn activate(&mut self, t: Float) -> Vec<(usize, NewPrtl)> {
        let mut ready = Vec::new();
        while self.pending.last().map_or(false, |p| p.t <= t) {
            if let Some(Pending { species, t: t0, mut prtl }) = self.pending.pop() {
                let u = prtl.u;
                let inv_gamma = 1.0 / (1.0 + u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt();
                let c1 = C * (t - t0) * inv_gamma;
                prtl.x += c1 * u[0];
                prtl.y += c1 * u[1];
                prtl.z += c1 * u[2];
                ready.push((species, prtl));
            }
        }
        if !ready.is_empty() {
            debug!(n = ready.len(), remaining = self.pending.len(), "activated queued particles");
        }
        ready
    }
}
