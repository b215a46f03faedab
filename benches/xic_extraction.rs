use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mzquant::peaks::PeakIntegrator;
use mzquant::scan::Scan;
use mzquant::xic::{Ion, MassTolerance, XicExtractor};

/// Profile-like scans: `points` ascending masses, a Gaussian elution of every
/// 50th mass centred on the middle of the run
fn generate_scans(num_scans: usize, points: usize) -> Vec<Scan> {
    (0..num_scans)
        .map(|i| {
            let rt = i as f64 * 0.02;
            let center = num_scans as f64 * 0.01;
            let elution = (-((rt - center) / 0.1).powi(2) / 2.0).exp();
            let mz: Vec<f64> = (0..points).map(|j| 100.0 + j as f64 * 0.5).collect();
            let intensity: Vec<f64> = (0..points)
                .map(|j| if j % 50 == 0 { 1e6 * elution + 100.0 } else { 100.0 })
                .collect();
            Scan::from_arrays(i, format!("scan={}", i + 1), rt, 1, mz, intensity)
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("xic_extract");
    let extractor = XicExtractor::new(MassTolerance::default());

    for num_scans in [500, 2000] {
        let scans = generate_scans(num_scans, 2000);
        let ion = Ion::new(600.0).unwrap();

        group.throughput(Throughput::Elements(num_scans as u64));
        group.bench_with_input(BenchmarkId::from_parameter(num_scans), &scans, |b, scans| {
            b.iter(|| black_box(extractor.extract(scans, &ion)));
        });
    }

    group.finish();
}

fn bench_extract_all(c: &mut Criterion) {
    let scans = generate_scans(2000, 2000);
    let ions: Vec<Ion> = (0..40)
        .map(|k| Ion::new(100.0 + k as f64 * 25.0).unwrap())
        .collect();
    let extractor = XicExtractor::new(MassTolerance::default());

    c.bench_function("xic_extract_all_40_ions", |b| {
        b.iter(|| black_box(extractor.extract_all(&scans, &ions)));
    });
}

fn bench_integrate(c: &mut Criterion) {
    let scans = generate_scans(2000, 200);
    let xic = XicExtractor::new(MassTolerance::default()).extract(&scans, &Ion::new(100.0).unwrap());
    let integrator = PeakIntegrator::default();

    c.bench_function("integrate_2000_points", |b| {
        b.iter(|| black_box(integrator.integrate(&xic.times, &xic.intensities, None)));
    });
}

criterion_group!(benches, bench_extract, bench_extract_all, bench_integrate);
criterion_main!(benches);
