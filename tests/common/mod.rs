use spectral_rz::config::SpeciesParams;
use spectral_rz::{Config, Sim};

// A small vacuum box shared by the integration tests.
#[allow(dead_code)]
pub fn test_config() -> Config {
    toml::from_str(
        r#"
        [grid]
        nz = 32
        nr = 16
        nm = 2
        zmin = 0.0
        zmax = 16e-6
        rmax = 16e-6

        [setup]
        n_steps = 10
        seed = 11

        [backend]
        kind = "serial"
        "#,
    )
    .expect("test config must parse")
}

#[allow(dead_code)]
pub fn species(toml_str: &str) -> SpeciesParams {
    toml::from_str(toml_str).expect("species must parse")
}

#[allow(dead_code)]
/// Electrons and ions with the same density and cell layout.
pub fn neutral_plasma(cfg: &mut Config, u_th: f64) {
    for (name, charge, mass) in [("electrons", -1.0, 1.0), ("ions", 1.0, 1836.152)] {
        cfg.species.push(species(&format!(
            r#"
            name = "{}"
            charge = {:?}
            mass = {:?}
            density = 1e24
            zmin = 0.0
            zmax = 16e-6
            rmax = 6e-6
            u_th = [{:?}, {:?}, {:?}]
            "#,
            name, charge, mass, u_th, u_th, u_th
        )));
    }
}

#[allow(dead_code)]
pub fn setup_sim() -> Sim {
    Sim::new(&test_config()).expect("test config must be valid")
}
