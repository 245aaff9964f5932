use crate::consts::PI;
use crate::{Config, Float};

/// Cell-centred (r, z) grid: z_i = zmin + (i + 1/2) dz, r_j = (j + 1/2) dr.
/// `zmin` advances when the moving window shifts.
#[derive(Clone, Debug)]
pub struct Geometry {
    pub nz: usize,
    pub nr: usize,
    pub nm: usize,
    /// Length of the longitudinal FFT, nz plus padding.
    pub nz_spectral: usize,
    /// Radial rows of a spectral array: kr = 0, then one per Bessel zero.
    pub nr_spectral: usize,
    /// Without padding z wraps around; with it, z is open.
    pub periodic_z: bool,
    pub dz: Float,
    pub dr: Float,
    pub zmin: Float,
    pub rmax: Float,
    pub dt: Float,
}

impl Geometry {
    pub fn new(cfg: &Config) -> Geometry {
        Geometry {
            nz: cfg.grid.nz,
            nr: cfg.grid.nr,
            nm: cfg.grid.nm,
            nz_spectral: cfg.grid.nz + cfg.grid.z_padding,
            nr_spectral: cfg.grid.nr + 1,
            periodic_z: cfg.grid.z_padding == 0,
            dz: cfg.dz(),
            dr: cfg.dr(),
            zmin: cfg.grid.zmin,
            rmax: cfg.grid.rmax,
            dt: cfg.dt(),
        }
    }

    #[inline(always)]
    pub fn zmax(&self) -> Float {
        self.zmin + self.nz as Float * self.dz
    }

    #[inline(always)]
    pub fn z(&self, iz: usize) -> Float {
        self.zmin + (iz as Float + 0.5) * self.dz
    }

    #[inline(always)]
    pub fn r(&self, ir: usize) -> Float {
        (ir as Float + 0.5) * self.dr
    }

    /// Volume of the full annulus of radial cell `ir`.
    #[inline(always)]
    pub fn cell_volume(&self, ir: usize) -> Float {
        2.0 * PI * self.r(ir) * self.dr * self.dz
    }

    #[inline(always)]
    pub fn contains(&self, z: Float, r: Float) -> bool {
        z >= self.zmin && z < self.zmax() && r < self.rmax
    }

    /// Number of complex values in one mode of a real-space array.
    pub fn spatial_len(&self) -> usize {
        self.nr * self.nz
    }

    pub fn spectral_len(&self) -> usize {
        self.nr_spectral * self.nz_spectral
    }
}
