//! Quasi-cylindrical spectral particle-in-cell core.
//!
//! Fields live on an (r, z) grid decomposed in azimuthal modes and are
//! advanced with an analytic (PSATD) integrator in Fourier-Hankel space.
//! Macro-particles are pushed in Cartesian coordinates and coupled to the
//! grid through shape-function deposition and gathering.
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

pub mod backend;
pub mod boost;
pub mod config;
pub mod consts;
pub mod error;
pub mod flds;
pub mod geometry;
pub mod laser;
pub mod moving_window;
pub mod prtls;
pub mod save;
pub mod simulation;

pub use config::Config;
pub use error::{ConfigError, NumericalInstability, StepReport};
pub use simulation::Sim;

// All numerics run in double precision: the Hankel matrices and the
// PSATD coefficients lose too much in f32.
pub type Float = f64;

pub const E_TOL: Float = 1E-12;

/// Highest number of azimuthal modes a run may carry.
pub const MAX_MODES: usize = 8;

/// Number of particles handed to one worker at a time. Deposition results
/// depend only on this size, never on the number of threads.
pub const PRTL_CHUNK_SIZE: usize = 4096;

pub fn run(cfg: Config) -> Result<()> {
    let mut sim = Sim::new(&cfg).context("Could not set up the simulation")?;
    info!(
        nz = sim.geom.nz,
        nr = sim.geom.nr,
        nm = sim.geom.nm,
        dt = sim.geom.dt,
        n_steps = cfg.setup.n_steps,
        "starting run"
    );

    for t in 0..cfg.setup.n_steps {
        if cfg.output.write_output && t % cfg.output.output_interval == 0 {
            save::save_output(&sim, &cfg.output)?;
        }
        let report = sim.step();
        debug!(
            step = report.step,
            removed = report.removed,
            ionized = report.ionized,
            injected = report.injected,
            "step done"
        );
        if !report.instabilities.is_empty() {
            for instability in &report.instabilities {
                warn!(step = report.step, "{}", instability);
            }
            anyhow::bail!(
                "numerical instability detected at step {}, stopping the run",
                report.step
            );
        }
    }
    if cfg.output.write_output {
        save::save_output(&sim, &cfg.output)?;
    }
    info!(steps = sim.step_count(), "run finished");
    Ok(())
}

#[cfg(test)]
pub(crate) fn build_test_config() -> Config {
    // A small vacuum box used by the unit tests.
    use crate::config::*;
    Config {
        grid: GridParams {
            nz: 16,
            nr: 10,
            nm: 2,
            zmin: 0.0,
            zmax: 16.0e-6,
            rmax: 10.0e-6,
            dt: None,
            z_padding: 0,
        },
        setup: Setup {
            n_steps: 10,
            seed: 7,
        },
        output: Output::default(),
        solver: SolverParams::default(),
        backend: BackendParams::Serial,
        boost: None,
        moving_window: None,
        species: Vec::new(),
        laser: Vec::new(),
    }
}

#[cfg(test)]
pub(crate) fn build_test_sim() -> Sim {
    Sim::new(&build_test_config()).expect("test config must be valid")
}
