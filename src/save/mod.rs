use crate::boost::{BoostConverter, ParticleEvent};
use crate::config::Output;
use crate::flds::field::Field;
use crate::{Float, Sim};
use anyhow::{Context, Result};
use rustfft::num_complex::Complex;
use std::fs;
use tracing::info;

/// Real-space modes of one field component.
#[derive(Clone, Debug)]
pub struct FieldSnapshot {
    pub name: &'static str,
    /// `modes[m]` is the row-major nr x nz array of mode m.
    pub modes: Vec<Vec<Complex<Float>>>,
}

/// The live particles of one species.
#[derive(Clone, Debug, Default)]
pub struct SpeciesSnapshot {
    pub name: String,
    pub species_id: usize,
    /// Time of each particle. Equal for all of them in the simulation
    /// frame, different once converted to the lab.
    pub t: Vec<Float>,
    pub x: Vec<Float>,
    pub y: Vec<Float>,
    pub z: Vec<Float>,
    pub ux: Vec<Float>,
    pub uy: Vec<Float>,
    pub uz: Vec<Float>,
    pub w: Vec<Float>,
}

/// Copy of the grid and particle state at the end of a step.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub step: u64,
    pub time: Float,
    pub zmin: Float,
    pub dz: Float,
    pub dr: Float,
    /// Er, Et, Ez, Br, Bt, Bz, Jr, Jt, Jz, rho in that order.
    pub fields: Vec<FieldSnapshot>,
    pub species: Vec<SpeciesSnapshot>,
}

impl Snapshot {
    pub fn new(sim: &Sim) -> Snapshot {
        let flds = &sim.flds;
        let mut fields: Vec<FieldSnapshot> = Vec::with_capacity(10);
        let grid: [&Field; 10] = [
            &flds.e.r,
            &flds.e.t,
            &flds.e.z,
            &flds.b.r,
            &flds.b.t,
            &flds.b.z,
            &flds.j.r,
            &flds.j.t,
            &flds.j.z,
            &flds.rho_next,
        ];
        for fld in grid {
            fields.push(FieldSnapshot {
                name: fld.name,
                modes: fld.spatial.clone(),
            });
        }

        let species = sim
            .species
            .iter()
            .enumerate()
            .map(|(id, sp)| {
                let mut snap = SpeciesSnapshot {
                    name: sp.name.clone(),
                    species_id: id,
                    ..SpeciesSnapshot::default()
                };
                for i in (0..sp.n_slots()).filter(|&i| sp.is_alive(i)) {
                    snap.t.push(sim.time());
                    snap.x.push(sp.x[i]);
                    snap.y.push(sp.y[i]);
                    snap.z.push(sp.z[i]);
                    snap.ux.push(sp.ux[i]);
                    snap.uy.push(sp.uy[i]);
                    snap.uz.push(sp.uz[i]);
                    snap.w.push(sp.w[i]);
                }
                snap
            })
            .collect();

        Snapshot {
            step: sim.step_count(),
            time: sim.time(),
            zmin: sim.geom.zmin,
            dz: sim.geom.dz,
            dr: sim.geom.dr,
            fields,
            species,
        }
    }

    /// Lab-frame view. E and B are transformed point by point on the same
    /// grid; J and rho are left as they are. Particles keep their own
    /// lab-frame event times.
    pub fn to_lab(&self, boost: &BoostConverter) -> Snapshot {
        let mut lab = self.clone();
        let (e, rest) = lab.fields.split_at_mut(3);
        let b = &mut rest[..3];
        for m in 0..e[0].modes.len() {
            for i in 0..e[0].modes[m].len() {
                let (el, bl) = boost.fields_to_lab(
                    [e[0].modes[m][i], e[1].modes[m][i], e[2].modes[m][i]],
                    [b[0].modes[m][i], b[1].modes[m][i], b[2].modes[m][i]],
                );
                for c in 0..3 {
                    e[c].modes[m][i] = el[c];
                    b[c].modes[m][i] = bl[c];
                }
            }
        }
        for sp in lab.species.iter_mut() {
            for i in 0..sp.x.len() {
                let ev = boost.particle_to_lab(&ParticleEvent {
                    t: sp.t[i],
                    x: sp.x[i],
                    y: sp.y[i],
                    z: sp.z[i],
                    u: [sp.ux[i], sp.uy[i], sp.uz[i]],
                });
                sp.t[i] = ev.t;
                sp.z[i] = ev.z;
                sp.ux[i] = ev.u[0];
                sp.uy[i] = ev.u[1];
                sp.uz[i] = ev.u[2];
            }
        }
        lab
    }
}

fn save_vec(data: Vec<Float>, path: String) -> Result<()> {
    npy::to_file(&path, data).with_context(|| format!("Could not save data to {}", path))?;
    Ok(())
}

/// Write the current state under `out_dir/dat_XXXXX/`, one npy file per
/// field mode (real and imaginary parts) and per particle quantity.
pub fn save_output(sim: &Sim, output: &Output) -> Result<()> {
    let mut snap = sim.snapshot();
    if output.lab_frame {
        if let Some(boost) = sim.boost() {
            snap = snap.to_lab(boost);
        }
    }
    let prefix = format!(
        "{}/dat_{:05}",
        output.out_dir,
        snap.step / output.output_interval as u64
    );
    fs::create_dir_all(format!("{}/flds", prefix)).context("Unable to create output directory")?;
    fs::create_dir_all(format!("{}/prtls", prefix)).context("Unable to create output directory")?;

    for fld in &snap.fields {
        for (m, mode) in fld.modes.iter().enumerate() {
            save_vec(mode.iter().map(|v| v.re).collect(), format!("{}/flds/{}_m{}_re.npy", prefix, fld.name, m))?;
            save_vec(mode.iter().map(|v| v.im).collect(), format!("{}/flds/{}_m{}_im.npy", prefix, fld.name, m))?;
        }
    }

    for sp in &snap.species {
        let quantities: [(&str, &Vec<Float>); 8] = [
            ("t", &sp.t),
            ("x", &sp.x),
            ("y", &sp.y),
            ("z", &sp.z),
            ("ux", &sp.ux),
            ("uy", &sp.uy),
            ("uz", &sp.uz),
            ("w", &sp.w),
        ];
        for (q, data) in quantities {
            let strided: Vec<Float> = data.iter().step_by(output.stride).copied().collect();
            save_vec(strided, format!("{}/prtls/{}_{}.npy", prefix, sp.name, q))?;
        }
    }
    info!(step = snap.step, dir = %prefix, "saved output");
    Ok(())
}
