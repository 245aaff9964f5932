use crate::flds::wave_num::WaveNumbers;
use crate::Float;
use rustfft::num_complex::Complex;

/// Spectral transfer function of `n_pass` passes of the [1/4, 1/2, 1/4]
/// stencil along z and r: [cos^2(kz dz/2) cos^2(kr dr/2)]^n_pass.
pub fn binomial_transfer(k: &WaveNumbers, dz: Float, dr: Float, n_pass: u8) -> Vec<Float> {
    k.k_z_fft
        .iter()
        .zip(&k.k_r)
        .map(|(kz, kr)| {
            let fz = (0.5 * kz * dz).cos().powi(2);
            let fr = (0.5 * kr * dr).cos().powi(2);
            (fz * fr).powi(n_pass as i32)
        })
        .collect()
}

#[inline(always)]
pub fn apply_filter(transfer: &[Float], spectral: &mut [Complex<Float>]) {
    if !cfg!(feature = "unchecked") {
        assert_eq!(transfer.len(), spectral.len());
    }
    for (v, f) in spectral.iter_mut().zip(transfer) {
        *v *= *f;
    }
}
