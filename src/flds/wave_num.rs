use crate::consts::PI;
use crate::flds::transform::SpectralTransform;
use crate::geometry::Geometry;
use crate::Float;

/// kz and kr laid out like one mode of a spectral array (row = kr index,
/// column = kz index).
pub struct WaveNumbers {
    /// kz as used by the derivative operators. It is zero on the Nyquist
    /// column, whose +kz and -kz cannot be told apart.
    pub k_z: Vec<Float>,
    /// The plain FFT frequency, Nyquist column included.
    pub k_z_fft: Vec<Float>,
    pub k_r: Vec<Float>,
    /// |k| = sqrt(kz^2 + kr^2)
    pub k_mag: Vec<Float>,
    /// 1 / |k|^2, and 0 where k vanishes.
    pub k_norm: Vec<Float>,
}

impl WaveNumbers {
    pub fn new(geom: &Geometry, transform: &SpectralTransform, m: usize) -> WaveNumbers {
        let nzs = geom.nz_spectral;
        let n = geom.nr_spectral * nzs;
        let mut k_z = vec![0.0; n];
        let mut k_z_fft = vec![0.0; n];
        let mut k_r = vec![0.0; n];

        let kr = transform.kr(m);
        let dk = 2.0 * PI / (nzs as Float * geom.dz);
        for i in 0..geom.nr_spectral {
            for j in 0..nzs {
                let ind = i * nzs + j;
                // FIRST DO K_Z
                let mut freq = j as Float;
                if j >= nzs / 2 + 1 {
                    freq -= nzs as Float;
                }
                k_z_fft[ind] = freq * dk;
                if nzs % 2 != 0 || j != nzs / 2 {
                    k_z[ind] = freq * dk;
                }
                // NOW DO K_R
                k_r[ind] = kr[i];
            }
        }
        let k_mag: Vec<Float> = k_z.iter().zip(&k_r).map(|(kz, kr)| kz.hypot(*kr)).collect();
        let k_norm = k_mag
            .iter()
            .map(|k| if *k > 0.0 { 1. / (k * k) } else { 0.0 })
            .collect();

        WaveNumbers {
            k_z,
            k_z_fft,
            k_r,
            k_mag,
            k_norm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_sim;

    #[test]
    fn fft_frequency_layout() {
        let sim = build_test_sim();
        let transform = SpectralTransform::new(&sim.geom).unwrap();
        let k = WaveNumbers::new(&sim.geom, &transform, 0);
        let nzs = sim.geom.nz_spectral;
        let dk = 2.0 * PI / (nzs as Float * sim.geom.dz);
        assert_eq!(k.k_z.len(), sim.geom.spectral_len());
        assert_eq!(k.k_z[0], 0.0);
        assert!((k.k_z[1] - dk).abs() < 1E-6 * dk);
        assert!((k.k_z[nzs - 1] + dk).abs() < 1E-6 * dk);
        // no derivative on the Nyquist column, but the filter still sees it
        assert_eq!(k.k_z[nzs / 2], 0.0);
        assert!((k.k_z_fft[nzs / 2] - (nzs / 2) as Float * dk).abs() < 1E-6 * dk);
        // first row is kr = 0, where k vanishes at kz = 0 and on Nyquist
        assert!(k.k_r[..nzs].iter().all(|&kr| kr == 0.0));
        assert!(k.k_r[nzs..].iter().all(|&kr| kr > 0.0));
        for (idx, n) in k.k_norm.iter().enumerate() {
            if idx == 0 || idx == nzs / 2 {
                assert_eq!(*n, 0.0);
            } else {
                assert!(n.is_finite() && *n > 0.0);
            }
        }
    }
}
