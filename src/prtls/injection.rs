//! Plasma loading: regular macro-particle placement inside cells, with
//! weights set by a longitudinal density profile.
use crate::boost::BoostConverter;
use crate::config::SpeciesParams;
use crate::consts::PI;
use crate::geometry::Geometry;
use crate::prtls::NewPrtl;
use crate::Float;
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::Deserialize;

/// Relative density as a function of z, multiplied by the species density.
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DensityProfile {
    #[default]
    Uniform,
    /// Zero before `z0`, rising linearly to 1 over `length`, then flat.
    LinearRamp { z0: Float, length: Float },
    /// Piecewise-linear interpolation between (z, n) points, held constant
    /// beyond both ends.
    Table { z: Vec<Float>, n: Vec<Float> },
}

impl DensityProfile {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DensityProfile::Uniform => Ok(()),
            DensityProfile::LinearRamp { z0, length } => {
                if !z0.is_finite() || !(*length > 0.0) {
                    Err(format!("ramp length must be positive, got {}", length))
                } else {
                    Ok(())
                }
            }
            DensityProfile::Table { z, n } => {
                if z.len() != n.len() || z.len() < 2 {
                    return Err("density table needs at least 2 (z, n) pairs".to_string());
                }
                if z.windows(2).any(|w| !(w[1] > w[0])) {
                    return Err("density table z must be strictly increasing".to_string());
                }
                if n.iter().any(|v| !(*v >= 0.0) || !v.is_finite()) {
                    return Err("density table values must be finite and >= 0".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn at(&self, z: Float) -> Float {
        match self {
            DensityProfile::Uniform => 1.0,
            DensityProfile::LinearRamp { z0, length } => ((z - z0) / length).clamp(0.0, 1.0),
            DensityProfile::Table { z: zs, n } => {
                let last = zs.len() - 1;
                if z <= zs[0] {
                    return n[0];
                }
                if z >= zs[last] {
                    return n[last];
                }
                let i = zs.partition_point(|&v| v <= z) - 1;
                let t = (z - zs[i]) / (zs[i + 1] - zs[i]);
                n[i] + t * (n[i + 1] - n[i])
            }
        }
    }

    /// The same profile with every z coordinate multiplied by `factor`.
    pub fn scaled_z(&self, factor: Float) -> DensityProfile {
        match self {
            DensityProfile::Uniform => DensityProfile::Uniform,
            DensityProfile::LinearRamp { z0, length } => DensityProfile::LinearRamp {
                z0: z0 * factor,
                length: length * factor,
            },
            DensityProfile::Table { z, n } => DensityProfile::Table {
                z: z.iter().map(|v| v * factor).collect(),
                n: n.clone(),
            },
        }
    }
}

/// Everything needed to fill a slab of cells with one species, in the
/// simulation frame.
#[derive(Clone, Debug)]
pub struct PlasmaLoader {
    density: Float,
    profile: DensityProfile,
    npz: usize,
    npr: usize,
    nptheta: usize,
    zmin: Float,
    zmax: Float,
    rmin: Float,
    rmax: Float,
    u_mean: [Float; 3],
    u_th: [Float; 3],
    /// Velocity of the plasma bounds and profile in the simulation frame.
    drift: Float,
    boost: Option<BoostConverter>,
}

impl PlasmaLoader {
    /// Lab-frame parameters in, simulation-frame loader out. With a boost,
    /// the plasma is taken at rest in the lab: lengths contract by gamma,
    /// the density grows by gamma and the whole profile drifts at -v.
    pub fn new(params: &SpeciesParams, boost: Option<&BoostConverter>) -> Option<PlasmaLoader> {
        if !(params.density > 0.0) {
            return None;
        }
        let (scale, density, drift) = match boost {
            Some(b) => (1.0 / b.gamma, params.density * b.gamma, -b.beta * crate::consts::C),
            None => (1.0, params.density, 0.0),
        };
        Some(PlasmaLoader {
            density,
            profile: params.profile.scaled_z(scale),
            npz: params.npz,
            npr: params.npr,
            nptheta: params.nptheta,
            zmin: params.zmin * scale,
            zmax: params.zmax * scale,
            rmin: params.rmin,
            rmax: params.rmax,
            u_mean: params.u_mean,
            u_th: params.u_th,
            drift,
            boost: boost.copied(),
        })
    }

    /// Fill the cells of `geom` between `z_lo` and `z_hi` at simulation
    /// time `t`.
    pub fn load<R: Rng>(&self, geom: &Geometry, z_lo: Float, z_hi: Float, t: Float, rng: &mut R) -> Vec<NewPrtl> {
        let shift = self.drift * t;
        let (zmin, zmax) = (self.zmin + shift, self.zmax + shift);
        let z_lo = z_lo.max(zmin).max(geom.zmin);
        let z_hi = z_hi.min(zmax).min(geom.zmax());
        let mut prtls = Vec::new();
        if !(z_hi > z_lo) {
            return prtls;
        }

        let iz_lo = ((z_lo - geom.zmin) / geom.dz).floor().max(0.0) as usize;
        let iz_hi = (((z_hi - geom.zmin) / geom.dz).ceil() as usize).min(geom.nz);
        let ir_lo = (self.rmin / geom.dr).floor() as usize;
        let ir_hi = ((self.rmax.min(geom.rmax) / geom.dr).ceil() as usize).min(geom.nr);

        let dzp = geom.dz / self.npz as Float;
        let drp = geom.dr / self.npr as Float;
        let dtheta = 2.0 * PI / self.nptheta as Float;

        for iz in iz_lo..iz_hi {
            for ir in ir_lo..ir_hi {
                // Each cell gets its own random azimuthal offset.
                let theta0: Float = rng.gen::<Float>() * dtheta;
                for kz in 0..self.npz {
                    let z = geom.zmin + (iz as Float + (kz as Float + 0.5) / self.npz as Float) * geom.dz;
                    if z < z_lo || z >= z_hi {
                        continue;
                    }
                    let n = self.density * self.profile.at(z - shift);
                    if !(n > 0.0) {
                        continue;
                    }
                    for kr in 0..self.npr {
                        let r = (ir as Float + (kr as Float + 0.5) / self.npr as Float) * geom.dr;
                        if r < self.rmin || r >= self.rmax {
                            continue;
                        }
                        let w = n * r * dtheta * drp * dzp;
                        for kt in 0..self.nptheta {
                            let theta = theta0 + kt as Float * dtheta;
                            let u = self.sample_momentum(rng);
                            prtls.push(NewPrtl {
                                x: r * theta.cos(),
                                y: r * theta.sin(),
                                z,
                                u,
                                w,
                                level: 0,
                            });
                        }
                    }
                }
            }
        }
        prtls
    }

    fn sample_momentum<R: Rng>(&self, rng: &mut R) -> [Float; 3] {
        let mut u = [0.0; 3];
        for (i, v) in u.iter_mut().enumerate() {
            let g: Float = rng.sample(StandardNormal);
            *v = self.u_mean[i] + self.u_th[i] * g;
        }
        match &self.boost {
            Some(b) => b.momentum_to_boosted(u),
            None => u,
        }
    }
}
