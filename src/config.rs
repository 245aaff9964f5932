use crate::consts::C;
use crate::error::ConfigError;
use crate::flds::continuity::ContinuityPolicy;
use crate::flds::psatd::CurrentOrder;
use crate::prtls::injection::DensityProfile;
use crate::prtls::ionization;
use crate::prtls::push::PusherKind;
use crate::prtls::shape::ShapeOrder;
use crate::{Float, MAX_MODES};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Run configuration. Read once, validated by `Sim::new`, never changed
/// afterwards.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub grid: GridParams,
    pub setup: Setup,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub solver: SolverParams,
    #[serde(default)]
    pub backend: BackendParams,
    #[serde(default)]
    pub boost: Option<BoostParams>,
    #[serde(default)]
    pub moving_window: Option<MovingWindowParams>,
    #[serde(default)]
    pub species: Vec<SpeciesParams>,
    #[serde(default)]
    pub laser: Vec<LaserParams>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GridParams {
    pub nz: usize,
    pub nr: usize,
    pub nm: usize,
    pub zmin: Float,
    pub zmax: Float,
    pub rmax: Float,
    /// Defaults to dz / c.
    #[serde(default)]
    pub dt: Option<Float>,
    /// Extra zero cells appended to the FFT along z.
    #[serde(default)]
    pub z_padding: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Setup {
    pub n_steps: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    0x5eed
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Output {
    pub write_output: bool,
    pub output_interval: u32,
    pub stride: usize,
    pub out_dir: String,
    /// Convert boosted-frame snapshots to the lab frame before writing.
    pub lab_frame: bool,
}

impl Default for Output {
    fn default() -> Self {
        Output {
            write_output: false,
            output_interval: 100,
            stride: 1,
            out_dir: "output".to_string(),
            lab_frame: false,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct SolverParams {
    pub current_order: CurrentOrder,
    pub continuity: ContinuityPolicy,
    pub shape: ShapeOrder,
    /// Passes of the spectral binomial filter applied to J and rho.
    pub n_pass: u8,
    /// Steps between particle arena compactions.
    pub compaction_period: u32,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            current_order: CurrentOrder::Constant,
            continuity: ContinuityPolicy::CurlFreeCurrent,
            shape: ShapeOrder::Linear,
            n_pass: 0,
            compaction_period: 50,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendParams {
    Serial,
    Threads {
        /// Defaults to the number of cores.
        #[serde(default)]
        n_threads: Option<usize>,
    },
}

impl Default for BackendParams {
    fn default() -> Self {
        BackendParams::Threads { n_threads: None }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct BoostParams {
    pub gamma: Float,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MovingWindowParams {
    /// Lab-frame velocity of the window.
    #[serde(default = "default_window_velocity")]
    pub v: Float,
    /// Steps between shift attempts.
    #[serde(default = "default_window_period")]
    pub period: u32,
}

fn default_window_velocity() -> Float {
    C
}

fn default_window_period() -> u32 {
    1
}

/// A particle species. Charge is in units of e, mass in units of m_e,
/// momenta are normalized (u = p / mc) and given in the lab frame.
#[derive(Deserialize, Clone, Debug)]
pub struct SpeciesParams {
    pub name: String,
    pub charge: Float,
    pub mass: Float,
    /// Peak physical density in m^-3.
    #[serde(default)]
    pub density: Float,
    #[serde(default)]
    pub profile: DensityProfile,
    #[serde(default = "default_ppc")]
    pub npz: usize,
    #[serde(default = "default_ppc")]
    pub npr: usize,
    #[serde(default = "default_nptheta")]
    pub nptheta: usize,
    #[serde(default)]
    pub zmin: Float,
    #[serde(default)]
    pub zmax: Float,
    #[serde(default)]
    pub rmin: Float,
    #[serde(default)]
    pub rmax: Float,
    #[serde(default)]
    pub u_mean: [Float; 3],
    #[serde(default)]
    pub u_th: [Float; 3],
    #[serde(default)]
    pub continuous_injection: bool,
    #[serde(default)]
    pub pusher: PusherKind,
    /// Initial arena size. Grows by doubling when exceeded.
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub ionization: Option<IonizationParams>,
}

fn default_ppc() -> usize {
    2
}

fn default_nptheta() -> usize {
    4
}

#[derive(Deserialize, Clone, Debug)]
pub struct IonizationParams {
    pub element: String,
    #[serde(default)]
    pub initial_level: u8,
    /// Name of the species that receives the freed electrons.
    pub target: String,
}

/// Linearly polarized Gaussian pulse, lab-frame parameters.
#[derive(Deserialize, Clone, Debug)]
pub struct LaserParams {
    pub a0: Float,
    pub waist: Float,
    pub ctau: Float,
    pub z0: Float,
    #[serde(default)]
    pub zf: Option<Float>,
    #[serde(default = "default_lambda0")]
    pub lambda0: Float,
    #[serde(default)]
    pub cep_phase: Float,
    #[serde(default)]
    pub theta_pol: Float,
    /// +1 for a pulse moving towards +z, -1 otherwise.
    #[serde(default = "default_direction")]
    pub direction: Float,
}

fn default_lambda0() -> Float {
    0.8e-6
}

fn default_direction() -> Float {
    1.0
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not open the config file {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Could not parse Config file")
    }

    pub fn dz(&self) -> Float {
        (self.grid.zmax - self.grid.zmin) / self.grid.nz as Float
    }

    pub fn dr(&self) -> Float {
        self.grid.rmax / self.grid.nr as Float
    }

    pub fn dt(&self) -> Float {
        self.grid.dt.unwrap_or_else(|| self.dz() / C)
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    /// Every check that must hold before a step can run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.grid;
        if grid.nz < 2 {
            return Err(ConfigError::TooFewCells {
                axis: "z",
                n: grid.nz,
            });
        }
        if grid.nr < 2 {
            return Err(ConfigError::TooFewCells {
                axis: "r",
                n: grid.nr,
            });
        }
        if !(grid.zmax > grid.zmin) || !grid.zmin.is_finite() || !grid.zmax.is_finite() {
            return Err(ConfigError::InvalidDomain(format!(
                "zmax ({}) must be greater than zmin ({})",
                grid.zmax, grid.zmin
            )));
        }
        if !(grid.rmax > 0.0) || !grid.rmax.is_finite() {
            return Err(ConfigError::InvalidDomain(format!(
                "rmax must be positive, got {}",
                grid.rmax
            )));
        }
        if grid.nm == 0 || grid.nm > MAX_MODES {
            return Err(ConfigError::ModeCount {
                requested: grid.nm,
                max: MAX_MODES,
            });
        }

        // Particles must not cross more than one cell per step for the
        // shape functions to stay local.
        let dt = self.dt();
        let bound = self.dz() / C;
        if !(dt > 0.0) || dt > bound * (1.0 + 1e-12) {
            return Err(ConfigError::UnstableTimestep { dt, bound });
        }

        self.validate_solver()?;
        self.validate_backend()?;
        self.validate_boost()?;
        self.validate_window()?;
        self.validate_species()?;
        self.validate_lasers()?;

        if self.output.output_interval == 0 || self.output.stride == 0 {
            return Err(ConfigError::InvalidOutput(
                "output_interval and stride must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_solver(&self) -> Result<(), ConfigError> {
        if let ContinuityPolicy::GaussProjection { period } = self.solver.continuity {
            if period == 0 {
                return Err(ConfigError::InvalidSolver(
                    "gauss projection period must be at least 1".to_string(),
                ));
            }
        }
        if self.solver.compaction_period == 0 {
            return Err(ConfigError::InvalidSolver(
                "compaction_period must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_backend(&self) -> Result<(), ConfigError> {
        if let BackendParams::Threads {
            n_threads: Some(n),
        } = self.backend
        {
            if n == 0 {
                return Err(ConfigError::InvalidBackend(
                    "thread count must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn validate_boost(&self) -> Result<(), ConfigError> {
        if let Some(boost) = &self.boost {
            if !(boost.gamma >= 1.0) || !boost.gamma.is_finite() {
                return Err(ConfigError::InvalidBoost(format!(
                    "gamma must be finite and >= 1, got {}",
                    boost.gamma
                )));
            }
        }
        Ok(())
    }

    fn validate_window(&self) -> Result<(), ConfigError> {
        if let Some(window) = &self.moving_window {
            if window.period == 0 {
                return Err(ConfigError::InvalidWindow(
                    "period must be at least 1".to_string(),
                ));
            }
            if !window.v.is_finite() || window.v.abs() > C {
                return Err(ConfigError::InvalidWindow(format!(
                    "velocity must satisfy |v| <= c, got {}",
                    window.v
                )));
            }
        }
        Ok(())
    }

    fn validate_species(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for sp in &self.species {
            let invalid = |reason: String| ConfigError::InvalidSpecies {
                name: sp.name.clone(),
                reason,
            };
            if !names.insert(sp.name.as_str()) {
                return Err(invalid("duplicate species name".to_string()));
            }
            if !(sp.mass > 0.0) || !sp.mass.is_finite() {
                return Err(invalid(format!("mass must be positive, got {}", sp.mass)));
            }
            if !sp.charge.is_finite() {
                return Err(invalid("charge must be finite".to_string()));
            }
            if !(sp.density >= 0.0) || !sp.density.is_finite() {
                return Err(invalid(format!(
                    "density must be non-negative, got {}",
                    sp.density
                )));
            }
            if sp.npz == 0 || sp.npr == 0 || sp.nptheta == 0 {
                return Err(invalid(
                    "particles per cell must be positive along every axis".to_string(),
                ));
            }
            if sp.density > 0.0 && (!(sp.zmax > sp.zmin) || !(sp.rmax > sp.rmin)) {
                return Err(invalid("plasma bounds are empty".to_string()));
            }
            if sp.rmin < 0.0 {
                return Err(invalid("rmin must be non-negative".to_string()));
            }
            if sp.u_mean.iter().chain(sp.u_th.iter()).any(|u| !u.is_finite()) {
                return Err(invalid("momenta must be finite".to_string()));
            }
            sp.profile.validate().map_err(invalid)?;
            if let Some(ion) = &sp.ionization {
                let element = ionization::Element::from_symbol(&ion.element)
                    .ok_or_else(|| invalid(format!("unknown element `{}`", ion.element)))?;
                if ion.initial_level as usize > element.atomic_number() {
                    return Err(invalid(format!(
                        "initial ionization level {} exceeds Z = {}",
                        ion.initial_level,
                        element.atomic_number()
                    )));
                }
                match self.species_index(&ion.target) {
                    None => {
                        return Err(invalid(format!(
                            "ionization target `{}` does not exist",
                            ion.target
                        )))
                    }
                    Some(i) if self.species[i].name == sp.name => {
                        return Err(invalid("a species cannot ionize into itself".to_string()))
                    }
                    Some(i) if self.species[i].ionization.is_some() => {
                        return Err(invalid(
                            "ionization target must not be ionizable itself".to_string(),
                        ))
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(())
    }

    fn validate_lasers(&self) -> Result<(), ConfigError> {
        for laser in &self.laser {
            if self.grid.nm < 2 {
                return Err(ConfigError::InvalidLaser(
                    "a linearly polarized laser needs at least 2 azimuthal modes".to_string(),
                ));
            }
            if !(laser.waist > 0.0) || !(laser.ctau > 0.0) || !(laser.lambda0 > 0.0) {
                return Err(ConfigError::InvalidLaser(
                    "waist, ctau and lambda0 must be positive".to_string(),
                ));
            }
            if !laser.a0.is_finite() || laser.direction.abs() != 1.0 {
                return Err(ConfigError::InvalidLaser(
                    "a0 must be finite and direction must be +1 or -1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_config;

    #[test]
    fn test_config_is_valid() {
        assert!(build_test_config().validate().is_ok());
    }

    #[test]
    fn rejects_too_many_modes() {
        let mut cfg = build_test_config();
        cfg.grid.nm = MAX_MODES + 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ModeCount { requested, .. }) if requested == MAX_MODES + 1
        ));
    }

    #[test]
    fn rejects_unstable_timestep() {
        let mut cfg = build_test_config();
        cfg.grid.dt = Some(2.0 * cfg.dz() / C);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::UnstableTimestep { .. })
        ));
        cfg.grid.dt = Some(0.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_grid() {
        let mut cfg = build_test_config();
        cfg.grid.nr = 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::TooFewCells { axis: "r", .. })
        ));
        let mut cfg = build_test_config();
        cfg.grid.zmax = cfg.grid.zmin;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidDomain(_))));
    }

    #[test]
    fn rejects_laser_without_mode_one() {
        let mut cfg = build_test_config();
        cfg.grid.nm = 1;
        cfg.laser.push(LaserParams {
            a0: 1.0,
            waist: 5e-6,
            ctau: 3e-6,
            z0: 8e-6,
            zf: None,
            lambda0: 0.8e-6,
            cep_phase: 0.0,
            theta_pol: 0.0,
            direction: 1.0,
        });
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidLaser(_))));
    }

    #[test]
    fn parses_toml() {
        let cfg: Config = toml::from_str(
            r#"
            [grid]
            nz = 32
            nr = 16
            nm = 2
            zmin = -10e-6
            zmax = 10e-6
            rmax = 20e-6

            [setup]
            n_steps = 5

            [solver]
            shape = "quadratic"
            current_order = "linear"
            continuity = { kind = "gauss_projection", period = 4 }

            [backend]
            kind = "threads"
            n_threads = 2

            [[species]]
            name = "electrons"
            charge = -1.0
            mass = 1.0
            density = 1e24
            zmin = 0.0
            zmax = 5e-6
            rmax = 10e-6
            "#,
        )
        .unwrap();
        assert_eq!(cfg.solver.shape, ShapeOrder::Quadratic);
        assert_eq!(cfg.solver.current_order, CurrentOrder::Linear);
        assert_eq!(
            cfg.solver.continuity,
            ContinuityPolicy::GaussProjection { period: 4 }
        );
        assert!(matches!(
            cfg.backend,
            BackendParams::Threads { n_threads: Some(2) }
        ));
        assert_eq!(cfg.species[0].npz, 2);
        assert!(cfg.validate().is_ok());
    }
}
