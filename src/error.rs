//! Construction-time errors and the per-step diagnostics returned to callers.
use crate::Float;
use std::fmt;
use thiserror::Error;

/// Problems found while building a simulation. Nothing has been stepped
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the grid needs at least 2 cells along {axis}, got {n}")]
    TooFewCells { axis: &'static str, n: usize },

    #[error("invalid domain: {0}")]
    InvalidDomain(String),

    #[error("number of azimuthal modes must be in 1..={max}, got {requested}")]
    ModeCount { requested: usize, max: usize },

    #[error("timestep {dt:e} s is not in the stable range (0, {bound:e}] s")]
    UnstableTimestep { dt: Float, bound: Float },

    #[error("invalid species `{name}`: {reason}")]
    InvalidSpecies { name: String, reason: String },

    #[error("Hankel matrix of mode {m}, order {order} is singular")]
    SingularHankel { m: usize, order: i32 },

    #[error("invalid boost: {0}")]
    InvalidBoost(String),

    #[error("invalid backend: {0}")]
    InvalidBackend(String),

    #[error("invalid laser: {0}")]
    InvalidLaser(String),

    #[error("invalid moving window: {0}")]
    InvalidWindow(String),

    #[error("invalid solver settings: {0}")]
    InvalidSolver(String),

    #[error("invalid output settings: {0}")]
    InvalidOutput(String),

    #[error("mode 0 of `{field}` must be real, found imaginary part {im:e}")]
    ComplexAxisymmetricMode { field: String, im: Float },

    #[error("`{field}` mode {m} expects {expected} values, got {got}")]
    ShapeMismatch {
        field: String,
        m: usize,
        expected: usize,
        got: usize,
    },
}

/// A non-finite value found at the end of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalInstability {
    Field { name: &'static str, mode: usize },
    Momentum { species: String, count: usize },
}

impl fmt::Display for NumericalInstability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalInstability::Field { name, mode } => {
                write!(f, "non-finite values in field {} (mode {})", name, mode)
            }
            NumericalInstability::Momentum { species, count } => write!(
                f,
                "{} particles of species {} have non-finite momenta",
                count, species
            ),
        }
    }
}

/// What happened during one call to `Sim::step`.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub step: u64,
    pub instabilities: Vec<NumericalInstability>,
    /// Particles absorbed at the domain boundary or left behind the window.
    pub removed: usize,
    /// Number of times a species had to reallocate its particle arena.
    pub capacity_growths: usize,
    pub ionized: usize,
    pub injected: usize,
}

impl StepReport {
    pub fn is_clean(&self) -> bool {
        self.instabilities.is_empty()
    }
}
