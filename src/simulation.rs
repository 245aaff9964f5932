use crate::backend::Backend;
use crate::boost::{BoostConverter, InjectionQueue};
use crate::config::Config;
use crate::error::{ConfigError, NumericalInstability, StepReport};
use crate::flds::psatd::CurrentOrder;
use crate::flds::Flds;
use crate::geometry::Geometry;
use crate::laser::add_laser;
use crate::moving_window::MovingWindow;
use crate::prtls::deposit::{deposit_current, deposit_rho};
use crate::prtls::gather::{gather_and_push, push_positions};
use crate::prtls::injection::PlasmaLoader;
use crate::prtls::ionization::{Element, Ionizer};
use crate::prtls::shape::ShapeOrder;
use crate::prtls::{NewPrtl, Species};
use crate::save::Snapshot;
use crate::Float;
use rand::prelude::*;
use tracing::{debug, info};

/// Everything needed to fill cells with one species, plus the level its
/// particles start at.
struct SpeciesSource {
    loader: Option<PlasmaLoader>,
    initial_level: u8,
}

pub struct Sim {
    pub geom: Geometry,
    pub flds: Flds,
    pub species: Vec<Species>,
    backend: Backend,
    shape: ShapeOrder,
    boost: Option<BoostConverter>,
    window: Option<MovingWindow>,
    sources: Vec<SpeciesSource>,
    ionizers: Vec<Option<Ionizer>>,
    queue: InjectionQueue,
    rng: StdRng,
    seed: u64,
    compaction_period: u32,
    step: u64,
    time: Float,
}

impl Sim {
    /// Validate `cfg` and build the initial state: fields with any lasers,
    /// loaded plasma and momenta at the half step u^{1/2}.
    pub fn new(cfg: &Config) -> Result<Sim, ConfigError> {
        cfg.validate()?;
        let geom = Geometry::new(cfg);
        let backend = Backend::new(&cfg.backend)?;
        let mut flds = Flds::new(&geom, &cfg.solver)?;
        let boost = cfg.boost.as_ref().map(|b| BoostConverter::new(b.gamma));
        let mut rng = StdRng::seed_from_u64(cfg.setup.seed);

        let mut species = Vec::with_capacity(cfg.species.len());
        let mut sources = Vec::with_capacity(cfg.species.len());
        let mut ionizers = Vec::with_capacity(cfg.species.len());
        for params in &cfg.species {
            let mut sp = Species::from_params(params);
            let source = SpeciesSource {
                loader: PlasmaLoader::new(params, boost.as_ref()),
                initial_level: params.ionization.as_ref().map_or(0, |ion| ion.initial_level),
            };
            if let Some(loader) = &source.loader {
                let prtls = loader.load(&geom, geom.zmin, geom.zmax(), 0.0, &mut rng);
                sp.extend(prtls.into_iter().map(|p| NewPrtl {
                    level: source.initial_level,
                    ..p
                }));
            }
            let ionizer = match &params.ionization {
                Some(ion) => {
                    let invalid = |reason: &str| ConfigError::InvalidSpecies {
                        name: params.name.clone(),
                        reason: reason.to_string(),
                    };
                    let element = Element::from_symbol(&ion.element).ok_or_else(|| invalid("unknown element"))?;
                    let target = cfg
                        .species_index(&ion.target)
                        .ok_or_else(|| invalid("unknown ionization target"))?;
                    Some(Ionizer::new(element, target))
                }
                None => None,
            };
            info!(species = %sp.name, n_prtls = sp.n_alive(), ionizable = ionizer.is_some(), "loaded species");
            species.push(sp);
            sources.push(source);
            ionizers.push(ionizer);
        }

        for laser in &cfg.laser {
            add_laser(&mut flds, &geom, laser, boost.as_ref());
        }

        let window = cfg
            .moving_window
            .as_ref()
            .map(|params| MovingWindow::new(params, boost.as_ref()));

        let mut sim = Sim {
            geom,
            flds,
            species,
            backend,
            shape: cfg.solver.shape,
            boost,
            window,
            sources,
            ionizers,
            queue: InjectionQueue::new(),
            rng,
            seed: cfg.setup.seed,
            compaction_period: cfg.solver.compaction_period,
            step: 0,
            time: 0.0,
        };
        // u^0 -> u^{1/2}
        let half = 0.5 * sim.geom.dt;
        for sp in sim.species.iter_mut() {
            gather_and_push(sp, &sim.flds.e, &sim.flds.b, &sim.geom, sim.shape, &sim.backend, half);
        }
        Ok(sim)
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }

    /// Simulation-frame time of the fields.
    pub fn time(&self) -> Float {
        self.time
    }

    pub fn boost(&self) -> Option<&BoostConverter> {
        self.boost.as_ref()
    }

    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|sp| sp.name == name)
    }

    /// Run `n` steps, stopping early after the first step that reports an
    /// instability.
    pub fn advance(&mut self, n: u64) -> Vec<StepReport> {
        let mut reports = Vec::new();
        for _ in 0..n {
            let report = self.step();
            let clean = report.is_clean();
            reports.push(report);
            if !clean {
                break;
            }
        }
        reports
    }

    /// One full PIC cycle. Particles enter at x^n, u^{n+1/2} and leave at
    /// x^{n+1}, u^{n+3/2}; fields go from t^n to t^{n+1}.
    pub fn step(&mut self) -> StepReport {
        let dt = self.geom.dt;
        let mut report = StepReport {
            step: self.step + 1,
            ..StepReport::default()
        };

        self.deposit_sources();
        report.removed += self.apply_boundaries();

        self.flds.update(&self.backend);

        for sp in self.species.iter_mut() {
            gather_and_push(sp, &self.flds.e, &self.flds.b, &self.geom, self.shape, &self.backend, dt);
        }
        self.step += 1;
        self.time += dt;

        report.ionized = self.ionize();
        let (step, dz) = (self.step, self.geom.dz);
        let shift = self.window.as_mut().map_or(0, |w| w.advance(step, dt, dz));
        if shift > 0 {
            let (removed, injected) = self.shift_window(shift);
            report.removed += removed;
            report.injected += injected;
        }
        report.injected += self.activate_queue();

        if self.step % self.compaction_period as u64 == 0 {
            for sp in self.species.iter_mut() {
                sp.compact();
            }
        }
        report.capacity_growths = self.species.iter_mut().map(|sp| sp.take_growths()).sum();
        report.instabilities = self.check_finite();
        report
    }

    /// Deposit rho at x^n, J and rho at x^{n+1}, moving the particles
    /// from one to the other.
    fn deposit_sources(&mut self) {
        let half = 0.5 * self.geom.dt;
        let linear = self.flds.order() == CurrentOrder::Linear;
        let (geom, shape, backend) = (&self.geom, self.shape, &self.backend);
        let flds = &mut self.flds;
        flds.zero_sources();
        for sp in self.species.iter() {
            deposit_rho(sp, geom, shape, backend, &mut flds.rho_prev);
            if linear {
                deposit_current(sp, geom, shape, backend, &mut flds.j0);
            }
        }
        for sp in self.species.iter_mut() {
            push_positions(sp, backend, half);
            if !linear {
                deposit_current(sp, geom, shape, backend, &mut flds.j);
            }
            push_positions(sp, backend, half);
            if linear {
                deposit_current(sp, geom, shape, backend, &mut flds.j);
            }
            deposit_rho(sp, geom, shape, backend, &mut flds.rho_next);
        }
    }

    /// Wrap or absorb particles that left the grid. Returns the number
    /// removed.
    fn apply_boundaries(&mut self) -> usize {
        let mut removed = 0;
        for sp in self.species.iter_mut() {
            if self.geom.periodic_z {
                sp.wrap_z(self.geom.zmin, self.geom.zmax());
            }
            removed += sp.remove_outside(&self.geom);
        }
        removed
    }

    fn ionize(&mut self) -> usize {
        let mut ionized = 0;
        for (i, ionizer) in self.ionizers.iter().enumerate() {
            let ionizer = match ionizer {
                Some(ionizer) => ionizer,
                None => continue,
            };
            let electrons = ionizer.ionize(
                &mut self.species[i],
                &self.flds.e,
                &self.geom,
                self.shape,
                &self.backend,
                self.geom.dt,
                self.seed,
                self.step,
            );
            ionized += self.species[ionizer.target].extend(electrons);
        }
        ionized
    }

    /// Shift the domain by `n` cells towards +z: fields move, particles
    /// left behind are removed and species with continuous injection fill
    /// the new cells. Returns (removed, injected).
    pub fn shift_window(&mut self, n: usize) -> (usize, usize) {
        let old_zmax = self.geom.zmax();
        self.flds.shift_z(n);
        self.geom.zmin += n as Float * self.geom.dz;

        let mut removed = 0;
        let mut injected = 0;
        for (sp, source) in self.species.iter_mut().zip(&self.sources) {
            removed += sp.remove_behind(self.geom.zmin);
            if !sp.continuous_injection {
                continue;
            }
            if let Some(loader) = &source.loader {
                let prtls = loader.load(&self.geom, old_zmax, self.geom.zmax(), self.time, &mut self.rng);
                let level = source.initial_level;
                injected += sp.extend(prtls.into_iter().map(|p| NewPrtl { level, ..p }));
            }
        }
        debug!(n, zmin = self.geom.zmin, removed, injected, "shifted window");
        (removed, injected)
    }

    /// Add particles to `species` now. Returns how many were added.
    pub fn inject(&mut self, species: usize, prtls: Vec<NewPrtl>) -> usize {
        self.species[species].extend(prtls)
    }

    /// Free slot `slot` of `species`.
    pub fn remove(&mut self, species: usize, slot: usize) {
        self.species[species].remove(slot);
    }

    /// Queue particles given at lab time `t_lab`. Each one enters the
    /// simulation when the simulation time reaches its own boosted-frame
    /// event time. Without a boost the two frames coincide.
    pub fn queue_lab_particles(&mut self, species: usize, t_lab: Float, prtls: Vec<NewPrtl>) {
        let boost = self.boost.unwrap_or_else(|| BoostConverter::new(1.0));
        for p in prtls {
            self.queue.push_lab(&boost, species, t_lab, p);
        }
    }

    fn activate_queue(&mut self) -> usize {
        if self.queue.is_empty() {
            return 0;
        }
        let ready = self.queue.activate(self.time);
        let n = ready.len();
        for (species, p) in ready {
            self.species[species].add(p);
        }
        n
    }

    /// Sum of q w over every live particle.
    pub fn total_charge(&self) -> Float {
        self.species.iter().map(|sp| sp.total_charge()).sum()
    }

    fn check_finite(&self) -> Vec<NumericalInstability> {
        let mut found = self.flds.check_finite();
        for sp in &self.species {
            let count = sp.count_nonfinite();
            if count > 0 {
                found.push(NumericalInstability::Momentum {
                    species: sp.name.clone(),
                    count,
                });
            }
        }
        found
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_test_config;
    use crate::config::SpeciesParams;
    use rustfft::num_complex::Complex;

    fn electrons() -> SpeciesParams {
        toml::from_str(
            r#"
            name = "electrons"
            charge = -1.0
            mass = 1.0
            density = 1e24
            zmin = 0.0
            zmax = 16e-6
            rmax = 6e-6
            "#,
        )
        .unwrap()
    }

    #[test]
    fn vacuum_steps_are_clean() {
        let mut sim = crate::build_test_sim();
        let reports = sim.advance(3);
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.is_clean()));
        assert_eq!(sim.step_count(), 3);
        assert!((sim.time() - 3.0 * sim.geom.dt).abs() < 1E-25);
    }

    #[test]
    fn advance_stops_on_instability() {
        let mut sim = crate::build_test_sim();
        sim.flds.e.z.spatial[0][5] = Complex::new(Float::NAN, 0.0);
        let reports = sim.advance(5);
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].is_clean());
    }

    #[test]
    fn unbounded_advance_runs_until_unstable() {
        let mut sim = crate::build_test_sim();
        sim.flds.e.r.spatial[1][3] = Complex::new(Float::INFINITY, 0.0);
        let reports = sim.advance(u64::MAX);
        assert_eq!(reports.len(), 1);
        assert_eq!(sim.step_count(), 1);
    }

    #[test]
    fn plasma_is_loaded_and_primed() {
        let mut cfg = build_test_config();
        cfg.species.push(electrons());
        let sim = Sim::new(&cfg).unwrap();
        assert_eq!(sim.species[0].n_alive(), 16 * 6 * 16);
        // no field, so priming leaves the plasma cold
        assert!(sim.species[0].ux.iter().all(|u| *u == 0.0));
    }

    #[test]
    fn injected_particles_are_stepped() {
        let mut cfg = build_test_config();
        cfg.species.push(SpeciesParams {
            density: 0.0,
            ..electrons()
        });
        let mut sim = Sim::new(&cfg).unwrap();
        assert_eq!(sim.species[0].n_alive(), 0);
        let added = sim.inject(
            0,
            vec![NewPrtl {
                x: 1e-6,
                y: 0.0,
                z: 8e-6,
                u: [0.0, 0.0, 1.0],
                w: 1.0,
                level: 0,
            }],
        );
        assert_eq!(added, 1);
        let z0 = sim.species[0].z[0];
        let report = sim.step();
        assert!(report.is_clean());
        assert!(sim.species[0].z[0] > z0);
        sim.remove(0, 0);
        assert_eq!(sim.species[0].n_alive(), 0);
    }
}
