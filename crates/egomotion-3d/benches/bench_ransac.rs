use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use egomotion_3d::linalg::{mat33_mul_vec3, rotation_from_axis_angle};
use egomotion_3d::pose::{decompose_essential, essential_8point, ransac_essential, RansacParams};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn synthetic_views(n: usize) -> (Vec<[f64; 2]>, Vec<[f64; 2]>) {
    let r = rotation_from_axis_angle(&[0.1, 1.0, 0.0], 0.08);
    let t = [0.4, 0.0, 0.1];
    let mut rng = StdRng::seed_from_u64(0);
    let mut x1 = Vec::with_capacity(n);
    let mut x2 = Vec::with_capacity(n);
    for i in 0..n {
        let p = [
            rng.random_range(-2.0..2.0),
            rng.random_range(-1.5..1.5),
            rng.random_range(4.0..10.0),
        ];
        let q = mat33_mul_vec3(&r, &p);
        x1.push([p[0] / p[2], p[1] / p[2]]);
        if i % 4 == 0 {
            x2.push([rng.random_range(-0.5..0.5), rng.random_range(-0.4..0.4)]);
        } else {
            let q = [q[0] + t[0], q[1] + t[1], q[2] + t[2]];
            x2.push([q[0] / q[2], q[1] / q[2]]);
        }
    }
    (x1, x2)
}

fn bench_two_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("TwoView");

    for n in [100, 500, 2000].iter() {
        let (x1, x2) = synthetic_views(*n);

        group.bench_with_input(BenchmarkId::new("essential_8point", n), &(&x1, &x2), |b, i| {
            b.iter(|| black_box(essential_8point(i.0, i.1)).unwrap())
        });

        group.bench_with_input(BenchmarkId::new("ransac_essential", n), &(&x1, &x2), |b, i| {
            let params = RansacParams {
                random_seed: Some(0),
                ..Default::default()
            };
            b.iter(|| {
                let mut rng = params.rng();
                black_box(ransac_essential(i.0, i.1, &params, &mut rng)).unwrap()
            })
        });
    }

    let (x1, x2) = synthetic_views(100);
    let e = essential_8point(&x1[1..9], &x2[1..9]).unwrap();
    group.bench_function("decompose_essential", |b| {
        b.iter(|| black_box(decompose_essential(&e)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, bench_two_view);
criterion_main!(benches);
