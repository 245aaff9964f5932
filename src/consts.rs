//! Physical constants (SI, CODATA 2018).
use crate::Float;

pub const PI: Float = std::f64::consts::PI;
pub const C: Float = 299_792_458.0;
pub const EPSILON_0: Float = 8.854_187_812_8e-12;
pub const MU_0: Float = 1.0 / (EPSILON_0 * C * C);
pub const E_CHARGE: Float = 1.602_176_634e-19;
pub const M_E: Float = 9.109_383_701_5e-31;
pub const M_P: Float = 1.672_621_923_69e-27;
