#[macro_use]
extern crate criterion;

use criterion::{BatchSize, Criterion};
use spectral_rz::{Config, Sim};

fn bench_config(backend: &str) -> Config {
    toml::from_str(&format!(
        r#"
        [grid]
        nz = 128
        nr = 32
        nm = 2
        zmin = 0.0
        zmax = 40e-6
        rmax = 20e-6
        z_padding = 16

        [setup]
        n_steps = 1
        seed = 1

        [solver]
        shape = "quadratic"
        n_pass = 1

        [backend]
        kind = "{}"

        [[species]]
        name = "electrons"
        charge = -1.0
        mass = 1.0
        density = 1e24
        zmin = 5e-6
        zmax = 35e-6
        rmax = 15e-6

        [[laser]]
        a0 = 1.0
        waist = 8e-6
        ctau = 5e-6
        z0 = 20e-6
        "#,
        backend
    ))
    .expect("bench config must parse")
}

fn criterion_benchmark(c: &mut Criterion) {
    for backend in ["serial", "threads"] {
        let cfg = bench_config(backend);
        c.bench_function(&format!("step {}", backend), |b| {
            b.iter_batched_ref(
                || Sim::new(&cfg).expect("bench config must be valid"),
                |sim| sim.step(),
                BatchSize::LargeInput,
            )
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
