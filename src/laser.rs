//! Gaussian laser pulses written directly into the fields at start-up.
use crate::boost::BoostConverter;
use crate::config::LaserParams;
use crate::consts::{C, E_CHARGE, M_E, PI};
use crate::flds::Flds;
use crate::geometry::Geometry;
use crate::Float;
use rustfft::num_complex::Complex;
use tracing::info;

/// Linearly polarized Gaussian pulse in the lab frame.
pub struct GaussianPulse {
    e0: Float,
    k0: Float,
    w0: Float,
    ctau: Float,
    z0: Float,
    zf: Float,
    zr: Float,
    cep_phase: Float,
    theta_pol: Float,
    direction: Float,
}

impl GaussianPulse {
    pub fn new(params: &LaserParams) -> GaussianPulse {
        let k0 = 2.0 * PI / params.lambda0;
        GaussianPulse {
            // peak field at focus
            e0: params.a0 * M_E * C * C * k0 / E_CHARGE,
            k0,
            w0: params.waist,
            ctau: params.ctau,
            z0: params.z0,
            zf: params.zf.unwrap_or(params.z0),
            zr: PI * params.waist * params.waist / params.lambda0,
            cep_phase: params.cep_phase,
            theta_pol: params.theta_pol,
            direction: params.direction,
        }
    }

    pub fn peak_field(&self) -> Float {
        self.e0
    }

    /// Transverse electric field along the polarization at lab (z, r, t).
    pub fn amplitude(&self, z: Float, r: Float, t: Float) -> Float {
        let d = self.direction;
        let xi = d * (z - self.z0) - C * t;
        let diffract = Complex::new(1.0, d * (z - self.zf) / self.zr);
        let arg = Complex::new(0.0, self.cep_phase + self.k0 * xi)
            - r * r / (self.w0 * self.w0 * diffract)
            - xi * xi / (self.ctau * self.ctau);
        self.e0 * (arg.exp() / diffract).re
    }

    /// Mode 1 amplitudes of (E, B) for a transverse field `e` along the
    /// polarization, propagating along `direction`.
    fn mode_one(&self, e: Float) -> ([Complex<Float>; 3], [Complex<Float>; 3]) {
        let pol = Complex::from_polar(0.5 * e, self.theta_pol);
        let er = pol;
        let et = -Complex::<Float>::i() * pol;
        let zero = Complex::new(0.0, 0.0);
        let d = self.direction;
        ([er, et, zero], [-et * (d / C), er * (d / C), zero])
    }
}

/// Add `params` to the real-space E and B of mode 1. With a boost, a
/// forward pulse is sampled on the lab events of the boosted t' = 0 plane
/// and transformed; a backward pulse is taken as given in the simulation
/// frame.
pub fn add_laser(flds: &mut Flds, geom: &Geometry, params: &LaserParams, boost: Option<&BoostConverter>) {
    let pulse = GaussianPulse::new(params);
    let boost = boost.filter(|_| params.direction > 0.0);
    let dim = flds.e.r.dim();
    for ir in 0..geom.nr {
        let r = geom.r(ir);
        for iz in 0..geom.nz {
            let z = geom.z(iz);
            let (z_lab, t_lab) = match boost {
                Some(b) => (b.gamma * z, b.gamma * b.beta * z / C),
                None => (z, 0.0),
            };
            let (mut e, mut b) = pulse.mode_one(pulse.amplitude(z_lab, r, t_lab));
            if let Some(boost) = boost {
                let (eb, bb) = boost.fields_to_boosted(e, b);
                e = eb;
                b = bb;
            }
            let idx = dim.get_index(crate::flds::field::Pos { row: ir, col: iz });
            for (fld, v) in flds.e.components_mut().into_iter().zip(e) {
                fld.spatial[1][idx] += v;
            }
            for (fld, v) in flds.b.components_mut().into_iter().zip(b) {
                fld.spatial[1][idx] += v;
            }
        }
    }
    // the paraxial profile is not exactly divergence free
    flds.clean_divergence();
    info!(
        a0 = params.a0,
        e0 = pulse.peak_field(),
        z0 = params.z0,
        boosted = boost.is_some(),
        "added laser"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_config;
    use crate::prtls::gather::gather_vector;
    use crate::prtls::shape::ShapeOrder;
    use crate::Sim;
    use approx::assert_relative_eq;

    fn params() -> LaserParams {
        LaserParams {
            a0: 1.0,
            waist: 4e-6,
            ctau: 3e-6,
            z0: 8e-6,
            zf: None,
            lambda0: 2e-6,
            cep_phase: 0.0,
            theta_pol: 0.0,
            direction: 1.0,
        }
    }

    #[test]
    fn peak_at_focus() {
        let pulse = GaussianPulse::new(&params());
        assert_relative_eq!(pulse.amplitude(8e-6, 0.0, 0.0), pulse.peak_field(), max_relative = 1E-12);
        // one waist off axis at focus the field drops by 1/e
        assert_relative_eq!(
            pulse.amplitude(8e-6, 4e-6, 0.0),
            pulse.peak_field() / std::f64::consts::E,
            max_relative = 1E-12
        );
        // a0 = 1 at 0.8 um is about 4 TV/m
        let ti = GaussianPulse::new(&LaserParams {
            lambda0: 0.8e-6,
            ..params()
        });
        assert!((ti.peak_field() - 4.01e12).abs() < 0.01e12);
    }

    #[test]
    fn pulse_is_polarized_along_x() {
        let mut cfg = build_test_config();
        cfg.grid.nz = 32;
        cfg.grid.zmax = 16e-6;
        cfg.laser.push(params());
        let sim = Sim::new(&cfg).unwrap();
        let e = gather_vector(&sim.flds.e, &sim.geom, ShapeOrder::Linear, 0.0, 1.2e-6, 8.2e-6);
        let ex = gather_vector(&sim.flds.e, &sim.geom, ShapeOrder::Linear, 1.2e-6, 0.0, 8.2e-6);
        assert!(ex[0].abs() > 1E11);
        assert!(e[1].abs() < 1E-3 * ex[0].abs());
        assert!(ex[1].abs() < 1E-3 * ex[0].abs());
    }

    #[test]
    fn mode_one_splits_polarization_and_b() {
        let pulse = GaussianPulse::new(&LaserParams {
            theta_pol: 0.3,
            ..params()
        });
        let (e, b) = pulse.mode_one(2.0);
        // (Ex, Ey) = (cos 0.3, sin 0.3): Er = E/2 e^{i theta}, Et = -i Er
        assert_relative_eq!(e[0].re, 0.3f64.cos(), max_relative = 1E-12);
        assert_relative_eq!(e[0].im, 0.3f64.sin(), max_relative = 1E-12);
        assert!((e[1] + Complex::<Float>::i() * e[0]).norm() < 1E-15);
        // B = z x E / c for a forward pulse
        assert!((b[0] + e[1] / C).norm() < 1E-20);
        assert!((b[1] - e[0] / C).norm() < 1E-20);
        assert_eq!(e[2], Complex::new(0.0, 0.0));
    }
}
