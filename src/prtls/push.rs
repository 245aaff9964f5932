//! Relativistic momentum integrators. Momenta are normalized, u = p / mc.
use crate::Float;
use serde::Deserialize;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PusherKind {
    #[default]
    Boris,
    /// Vay (2008). Keeps E + v x B = 0 drifts exact at high gamma.
    Vay,
}

/// Charge-to-mass factors of one species for one step.
#[derive(Clone, Copy, Debug)]
pub struct PushCoefs {
    /// q dt / (2 m c), multiplies E.
    pub alpha: Float,
    /// q dt / (2 m), multiplies B.
    pub beta: Float,
}

impl PushCoefs {
    pub fn new(charge: Float, mass: Float, dt: Float) -> PushCoefs {
        let beta = (charge / mass) * 0.5 * dt;
        PushCoefs {
            alpha: beta / crate::consts::C,
            beta,
        }
    }
}

impl PusherKind {
    /// Advance `u` by one full step in the fields `e`, `b` and return the
    /// new inverse Lorentz factor.
    #[inline(always)]
    pub fn push(self, u: &mut [Float; 3], e: [Float; 3], b: [Float; 3], coefs: PushCoefs) -> Float {
        match self {
            PusherKind::Boris => boris(u, e, b, coefs),
            PusherKind::Vay => vay(u, e, b, coefs),
        }
    }
}

#[inline(always)]
fn boris(u: &mut [Float; 3], e: [Float; 3], b: [Float; 3], coefs: PushCoefs) -> Float {
    let ext = e[0] * coefs.alpha;
    let eyt = e[1] * coefs.alpha;
    let ezt = e[2] * coefs.alpha;
    let mut bxt = b[0] * coefs.beta;
    let mut byt = b[1] * coefs.beta;
    let mut bzt = b[2] * coefs.beta;

    //  Now, the Boris push:
    let ux = u[0] + ext;
    let uy = u[1] + eyt;
    let uz = u[2] + ezt;
    let gt = (1. + ux * ux + uy * uy + uz * uz).sqrt().powi(-1);

    bxt *= gt;
    byt *= gt;
    bzt *= gt;

    let boris = 2.0 * (1.0 + bxt * bxt + byt * byt + bzt * bzt).powi(-1);

    let uxt = ux + uy * bzt - uz * byt;
    let uyt = uy + uz * bxt - ux * bzt;
    let uzt = uz + ux * byt - uy * bxt;

    u[0] = ux + boris * (uyt * bzt - uzt * byt) + ext;
    u[1] = uy + boris * (uzt * bxt - uxt * bzt) + eyt;
    u[2] = uz + boris * (uxt * byt - uyt * bxt) + ezt;

    (1.0 + u[0] * u[0] + u[1] * u[1] + u[2] * u[2]).sqrt().powi(-1)
}

#[inline(always)]
fn vay(u: &mut [Float; 3], e: [Float; 3], b: [Float; 3], coefs: PushCoefs) -> Float {
    let tau = [b[0] * coefs.beta, b[1] * coefs.beta, b[2] * coefs.beta];
    let eps = [e[0] * coefs.alpha, e[1] * coefs.alpha, e[2] * coefs.alpha];
    let inv_gamma = (1.0 + dot(u, u)).sqrt().powi(-1);

    // half step with the old velocity
    let v = [u[0] * inv_gamma, u[1] * inv_gamma, u[2] * inv_gamma];
    let v_cross_tau = cross(&v, &tau);
    let u_prime = [
        u[0] + 2.0 * eps[0] + v_cross_tau[0],
        u[1] + 2.0 * eps[1] + v_cross_tau[1],
        u[2] + 2.0 * eps[2] + v_cross_tau[2],
    ];

    let gamma_prime_sqd = 1.0 + dot(&u_prime, &u_prime);
    let tau_sqd = dot(&tau, &tau);
    let u_star = dot(&u_prime, &tau);
    let sigma = gamma_prime_sqd - tau_sqd;
    let gamma = (0.5 * sigma + (0.25 * sigma * sigma + tau_sqd + u_star * u_star).sqrt()).sqrt();

    let t = [tau[0] / gamma, tau[1] / gamma, tau[2] / gamma];
    let s = (1.0 + dot(&t, &t)).powi(-1);
    let u_dot_t = dot(&u_prime, &t);
    let u_cross_t = cross(&u_prime, &t);
    for i in 0..3 {
        u[i] = s * (u_prime[i] + u_dot_t * t[i] + u_cross_t[i]);
    }

    gamma.powi(-1)
}

#[inline(always)]
fn dot(a: &[Float; 3], b: &[Float; 3]) -> Float {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline(always)]
fn cross(a: &[Float; 3], b: &[Float; 3]) -> [Float; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
