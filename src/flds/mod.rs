use crate::backend::Backend;
use crate::config::SolverParams;
use crate::error::{ConfigError, NumericalInstability};
use crate::geometry::Geometry;
use crate::Float;
use rustfft::num_complex::Complex;
use tracing::debug;

pub mod bessel;
pub mod binomial_filter;
pub mod continuity;
pub mod field;
pub mod hankel;
pub mod psatd;
pub mod transform;
pub mod wave_num;

use crate::flds::binomial_filter::{apply_filter, binomial_transfer};
use crate::flds::continuity::{correct_currents, project_gauss, ContinuityPolicy};
use crate::flds::field::{Field, SpectralVec, VecField};
use crate::flds::psatd::{CurrentOrder, Psatd};
use crate::flds::transform::SpectralTransform;
use crate::flds::wave_num::WaveNumbers;

/// Everything one mode needs during the spectral push.
struct ModeView<'a> {
    e: SpectralVec<'a>,
    b: SpectralVec<'a>,
    j: SpectralVec<'a>,
    j0: Option<SpectralVec<'a>>,
    rho_prev: &'a [Complex<Float>],
    rho_next: &'a [Complex<Float>],
}

pub struct Flds {
    // The struct that holds all the fields. E and B persist in real space
    // between steps; the spectral arrays are scratch for one update.
    pub e: VecField,
    pub b: VecField,
    /// Current deposited for the step. With `CurrentOrder::Linear` this is
    /// the current at the end of the step.
    pub j: VecField,
    /// Current at the start of the step, only used with
    /// `CurrentOrder::Linear`.
    pub j0: VecField,
    pub rho_prev: Field,
    pub rho_next: Field,
    transform: SpectralTransform,
    k: Vec<WaveNumbers>,
    psatd: Psatd,
    filter: Option<Vec<Vec<Float>>>,
    continuity: ContinuityPolicy,
    dt: Float,
    n_pushes: u64,
}

impl Flds {
    pub fn new(geom: &Geometry, solver: &SolverParams) -> Result<Flds, ConfigError> {
        let transform = SpectralTransform::new(geom)?;
        let k: Vec<WaveNumbers> = (0..geom.nm)
            .map(|m| WaveNumbers::new(geom, &transform, m))
            .collect();
        let psatd = Psatd::new(&k, geom.dt, solver.current_order);
        let filter = if solver.n_pass > 0 {
            Some(
                k.iter()
                    .map(|k| binomial_transfer(k, geom.dz, geom.dr, solver.n_pass))
                    .collect(),
            )
        } else {
            None
        };
        debug!(
            order = ?solver.current_order,
            continuity = ?solver.continuity,
            n_pass = solver.n_pass,
            "built field solver"
        );

        Ok(Flds {
            e: VecField::new(["er", "et", "ez"], geom),
            b: VecField::new(["br", "bt", "bz"], geom),
            j: VecField::new(["jr", "jt", "jz"], geom),
            j0: VecField::new(["jr0", "jt0", "jz0"], geom),
            rho_prev: Field::new("rho_prev", geom),
            rho_next: Field::new("rho", geom),
            transform,
            k,
            psatd,
            filter,
            continuity: solver.continuity,
            dt: geom.dt,
            n_pushes: 0,
        })
    }

    pub fn order(&self) -> CurrentOrder {
        self.psatd.order
    }

    /// Zero every source array before a new deposition.
    pub fn zero_sources(&mut self) {
        self.j.zero_spatial();
        self.j0.zero_spatial();
        self.rho_prev.zero_spatial();
        self.rho_next.zero_spatial();
    }

    /// Advance E and B by one step from the deposited sources. On return the
    /// real-space arrays of E and B hold the new fields.
    pub fn update(&mut self, backend: &Backend) {
        let linear = self.psatd.order == CurrentOrder::Linear;
        self.sources_to_spectral(linear);
        self.fields_to_spectral();

        self.n_pushes += 1;
        let project = match self.continuity {
            ContinuityPolicy::GaussProjection { period } => self.n_pushes % period as u64 == 0,
            ContinuityPolicy::CurlFreeCurrent => false,
        };
        let correct = self.continuity == ContinuityPolicy::CurlFreeCurrent;

        let j0_modes: Vec<Option<SpectralVec>> = if linear {
            self.j0.spectral_modes_mut().into_iter().map(Some).collect()
        } else {
            self.j.r.spectral.iter().map(|_| None).collect()
        };
        let mut views: Vec<ModeView> = itertools::izip!(
            self.e.spectral_modes_mut(),
            self.b.spectral_modes_mut(),
            self.j.spectral_modes_mut(),
            j0_modes,
            &self.rho_prev.spectral,
            &self.rho_next.spectral
        )
        .map(|(e, b, j, j0, rho_prev, rho_next)| ModeView {
            e,
            b,
            j,
            j0,
            rho_prev,
            rho_next,
        })
        .collect();

        let k = &self.k;
        let psatd = &self.psatd;
        let dt = self.dt;
        // Modes are independent, so each one is a unit of work.
        backend.for_each_chunk_mut(&mut views, 1, |m, view| {
            for v in view.iter_mut() {
                let k = &k[m];
                if correct {
                    let j0 = v.j0.as_mut().map(|j0| j0.reborrow());
                    correct_currents(k, dt, v.rho_prev, v.rho_next, v.j.reborrow(), j0);
                }
                let j0 = v.j0.as_ref().map(|j0| j0.view());
                psatd.push_mode(
                    m,
                    k,
                    v.e.reborrow(),
                    v.b.reborrow(),
                    v.j.view(),
                    j0,
                    v.rho_prev,
                    v.rho_next,
                );
                if project {
                    project_gauss(k, v.rho_next, v.e.reborrow());
                }
            }
        });
        drop(views);

        self.fields_to_real();
    }

    fn sources_to_spectral(&mut self, linear: bool) {
        self.transform.vector_to_spectral(&mut self.j);
        if linear {
            self.transform.vector_to_spectral(&mut self.j0);
        }
        self.transform.scalar_to_spectral(&mut self.rho_prev);
        self.transform.scalar_to_spectral(&mut self.rho_next);

        if let Some(filter) = &self.filter {
            for (m, transfer) in filter.iter().enumerate() {
                let mut targets: Vec<&mut Vec<Complex<Float>>> = vec![
                    &mut self.rho_prev.spectral[m],
                    &mut self.rho_next.spectral[m],
                ];
                targets.extend(self.j.components_mut().into_iter().map(|c| &mut c.spectral[m]));
                if linear {
                    targets.extend(self.j0.components_mut().into_iter().map(|c| &mut c.spectral[m]));
                }
                for spectral in targets {
                    apply_filter(transfer, spectral);
                }
            }
        }
    }

    pub fn fields_to_spectral(&mut self) {
        self.transform.vector_to_spectral(&mut self.e);
        self.transform.vector_to_spectral(&mut self.b);
    }

    pub fn fields_to_real(&mut self) {
        self.transform.vector_to_real(&mut self.e);
        self.transform.vector_to_real(&mut self.b);
    }

    /// Project E onto div E = 0 and leave the result in real space. Used
    /// after writing fields by hand, before any charge is on the grid.
    pub fn clean_divergence(&mut self) {
        self.fields_to_spectral();
        let zeros = vec![Complex::new(0.0, 0.0); self.rho_next.spectral_dim().len()];
        for (m, e) in self.e.spectral_modes_mut().into_iter().enumerate() {
            project_gauss(&self.k[m], &zeros, e);
        }
        self.fields_to_real();
    }

    pub fn wave_numbers(&self, m: usize) -> &WaveNumbers {
        &self.k[m]
    }

    /// Move E and B `n` cells towards lower z, zeroing the leading edge.
    pub fn shift_z(&mut self, n: usize) {
        self.e.shift_z(n);
        self.b.shift_z(n);
    }

    pub fn check_finite(&self) -> Vec<NumericalInstability> {
        let mut found = Vec::new();
        for fld in self.e.components().into_iter().chain(self.b.components()) {
            for m in 0..fld.n_modes() {
                if !fld.is_finite(m) {
                    found.push(NumericalInstability::Field {
                        name: fld.name,
                        mode: m,
                    });
                }
            }
        }
        found
    }
}
