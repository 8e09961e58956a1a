use canopy::Partition as _;
use canopy::Point2D;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use criterion::Criterion;
use criterion::Throughput;


const SAMPLE_SIZE: usize = 20_000;

fn blob_centers() -> Vec<Point2D> {
    (0..16)
        .map(|i| Point2D::new((i % 4) as f64 * 20.0, (i / 4) as f64 * 20.0))
        .collect()
}

fn bench_canopies(c: &mut Criterion) {
    let points = generator::uniform_rectangle(
        Point2D::new(0.0, 0.0),
        Point2D::new(100.0, 100.0),
        SAMPLE_SIZE,
    );
    let builder = canopy::CanopyBuilder {
        t1: 3.0,
        t2: 1.5,
        measure: canopy::Manhattan,
    };

    let mut group = c.benchmark_group("canopies");
    group.throughput(Throughput::Elements(SAMPLE_SIZE as u64));
    group.bench_function("uniform", |b| {
        b.iter(|| builder.build(black_box(points.iter().copied())))
    });
    group.finish();
}

fn bench_canopy_k_means(c: &mut Criterion) {
    let points = generator::blobs(&blob_centers(), 6.0, SAMPLE_SIZE / 16);
    let mut partition = vec![0; points.len()];
    let mut algorithm = canopy::CanopyKMeans {
        t1: 3.0,
        t2: 1.5,
        measure: canopy::Euclidean,
        ..Default::default()
    };

    let core_count = num_cpus::get();
    let mut group = c.benchmark_group("canopy_k_means");
    group.throughput(Throughput::Elements(points.len() as u64));

    for thread_count in [1, 2, 4, 8, 16] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .spawn_handler(|thread| {
                let mut b = std::thread::Builder::new();
                if let Some(name) = thread.name() {
                    b = b.name(name.to_owned());
                }
                if let Some(stack_size) = thread.stack_size() {
                    b = b.stack_size(stack_size);
                }
                b.spawn(move || {
                    let core_idx = thread.index() % core_count;
                    core_affinity::set_for_current(core_affinity::CoreId { id: core_idx });
                    thread.run();
                })?;
                Ok(())
            })
            .build()
            .unwrap();
        group.bench_function(&thread_count.to_string(), |b| {
            pool.install(|| {
                b.iter(|| {
                    algorithm.partition(black_box(&mut partition), black_box(&points[..]))
                })
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_canopies, bench_canopy_k_means);
criterion_main!(benches);
