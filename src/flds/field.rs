use crate::error::ConfigError;
use crate::geometry::Geometry;
use crate::Float;
use num_traits::Zero;
use rustfft::num_complex::Complex;

pub struct Pos {
    pub row: usize,
    pub col: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDim {
    pub size_r: usize,
    pub size_z: usize,
}

impl FieldDim {
    pub fn get_index(&self, pos: Pos) -> usize {
        // Using a 1d vec to represent each mode's 2D array. Rows are radial
        // cells, columns are longitudinal cells, so a row is contiguous in z
        // and can be handed to the FFT directly.
        // ----------------------------------
        // |   [0]    |   [1]    |   [2]    |
        // |  r: 0    |  r: 0    |  r: 0    |
        // |  z: 0    |  z: 1    |  z: 2    |
        // ----------------------------------
        // |   [3]    |   [4]    |   [5]    |
        // |  r: 1    |  r: 1    |  r: 1    |
        // |  z: 0    |  z: 1    |  z: 2    |
        // ----------------------------------
        if !cfg!(feature = "unchecked") {
            assert!(pos.col < self.size_z);
            assert!(pos.row < self.size_r);
        }

        pos.row * self.size_z + pos.col
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.size_r * self.size_z
    }
}

/// One field component for all azimuthal modes, in real space and in
/// spectral space.
///
/// Both representations use uniform complex storage. Mode 0 is real in
/// physical space: `set_mode` rejects mode-0 data with an imaginary part
/// and `enforce_real_axis` strips the round-off residual after every
/// transform back to real space.
///
/// For the transverse components of a `VecField`, the spectral array of
/// `r` holds the F+ = (Fr - iFt)/2 component and the one of `t` holds
/// F- = (Fr + iFt)/2.
pub struct Field {
    pub name: &'static str,
    pub spatial: Vec<Vec<Complex<Float>>>,
    pub spectral: Vec<Vec<Complex<Float>>>,
    pub(crate) dim: FieldDim,
    pub(crate) spectral_dim: FieldDim,
}

impl Field {
    pub fn new(name: &'static str, geom: &Geometry) -> Field {
        let dim = FieldDim {
            size_r: geom.nr,
            size_z: geom.nz,
        };
        let spectral_dim = FieldDim {
            size_r: geom.nr_spectral,
            size_z: geom.nz_spectral,
        };
        Field {
            name,
            spatial: vec![vec![Complex::zero(); dim.len()]; geom.nm],
            spectral: vec![vec![Complex::zero(); spectral_dim.len()]; geom.nm],
            dim,
            spectral_dim,
        }
    }

    pub fn dim(&self) -> FieldDim {
        self.dim
    }

    pub fn spectral_dim(&self) -> FieldDim {
        self.spectral_dim
    }

    pub fn n_modes(&self) -> usize {
        self.spatial.len()
    }

    /// Replace the real-space data of mode `m`.
    pub fn set_mode(&mut self, m: usize, data: Vec<Complex<Float>>) -> Result<(), ConfigError> {
        if data.len() != self.dim.len() {
            return Err(ConfigError::ShapeMismatch {
                field: self.name.to_string(),
                m,
                expected: self.dim.len(),
                got: data.len(),
            });
        }
        if m == 0 {
            let im = data.iter().map(|v| v.im.abs()).fold(0.0, Float::max);
            if im != 0.0 {
                return Err(ConfigError::ComplexAxisymmetricMode {
                    field: self.name.to_string(),
                    im,
                });
            }
        }
        self.spatial[m] = data;
        Ok(())
    }

    pub fn zero_spatial(&mut self) {
        for mode in self.spatial.iter_mut() {
            for v in mode.iter_mut() {
                *v = Complex::zero();
            }
        }
    }

    /// Zero the imaginary part of mode 0 and return what was discarded.
    pub(crate) fn enforce_real_axis(&mut self) -> Float {
        let mut im_sum = 0.0;
        if let Some(mode0) = self.spatial.first_mut() {
            for v in mode0.iter_mut() {
                im_sum += v.im.abs();
                v.im = 0.0;
            }
        }
        im_sum
    }

    /// Move every row `n` cells towards lower z. The last `n` cells of
    /// each row are zeroed.
    pub fn shift_z(&mut self, n: usize) {
        let nz = self.dim.size_z;
        let n = n.min(nz);
        for mode in self.spatial.iter_mut() {
            for row in mode.chunks_mut(nz) {
                row.copy_within(n.., 0);
                for v in row[nz - n..].iter_mut() {
                    *v = Complex::zero();
                }
            }
        }
    }

    pub fn is_finite(&self, m: usize) -> bool {
        self.spatial[m]
            .iter()
            .all(|v| v.re.is_finite() && v.im.is_finite())
    }

    pub fn max_abs(&self) -> Float {
        self.spatial
            .iter()
            .flat_map(|mode| mode.iter())
            .map(|v| v.norm())
            .fold(0.0, Float::max)
    }

    /// Value of mode `m` at radial cell `ir`, longitudinal cell `iz`.
    pub fn at(&self, m: usize, ir: usize, iz: usize) -> Complex<Float> {
        self.spatial[m][self.dim.get_index(Pos { row: ir, col: iz })]
    }
}

/// Spectral components (+, -, z) of one mode of a `VecField`.
pub struct SpectralVec<'a> {
    pub p: &'a mut [Complex<Float>],
    pub m: &'a mut [Complex<Float>],
    pub z: &'a mut [Complex<Float>],
}

impl<'a> SpectralVec<'a> {
    pub fn reborrow(&mut self) -> SpectralVec<'_> {
        SpectralVec {
            p: &mut *self.p,
            m: &mut *self.m,
            z: &mut *self.z,
        }
    }

    pub fn view(&self) -> SpectralRef<'_> {
        SpectralRef {
            p: &*self.p,
            m: &*self.m,
            z: &*self.z,
        }
    }

    pub fn components_mut(&mut self) -> [&mut [Complex<Float>]; 3] {
        [&mut *self.p, &mut *self.m, &mut *self.z]
    }
}

#[derive(Clone, Copy)]
pub struct SpectralRef<'a> {
    pub p: &'a [Complex<Float>],
    pub m: &'a [Complex<Float>],
    pub z: &'a [Complex<Float>],
}

/// A cylindrical vector field (r, theta, z components).
pub struct VecField {
    pub r: Field,
    pub t: Field,
    pub z: Field,
}

impl VecField {
    pub fn new(names: [&'static str; 3], geom: &Geometry) -> VecField {
        VecField {
            r: Field::new(names[0], geom),
            t: Field::new(names[1], geom),
            z: Field::new(names[2], geom),
        }
    }

    pub fn components(&self) -> [&Field; 3] {
        [&self.r, &self.t, &self.z]
    }

    pub fn components_mut(&mut self) -> [&mut Field; 3] {
        [&mut self.r, &mut self.t, &mut self.z]
    }

    pub fn zero_spatial(&mut self) {
        for c in self.components_mut() {
            c.zero_spatial();
        }
    }

    pub fn spectral_mut(&mut self, m: usize) -> SpectralVec<'_> {
        SpectralVec {
            p: &mut self.r.spectral[m],
            m: &mut self.t.spectral[m],
            z: &mut self.z.spectral[m],
        }
    }

    /// Split the spectral storage into one view per mode.
    pub fn spectral_modes_mut(&mut self) -> Vec<SpectralVec<'_>> {
        self.r
            .spectral
            .iter_mut()
            .zip(self.t.spectral.iter_mut())
            .zip(self.z.spectral.iter_mut())
            .map(|((p, m), z)| SpectralVec { p, m, z })
            .collect()
    }

    pub fn shift_z(&mut self, n: usize) {
        for c in self.components_mut() {
            c.shift_z(n);
        }
    }
}
