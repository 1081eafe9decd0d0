use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ltcode::ecc::{Decoder, Droplet, Encoder, RobustSoliton};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn payload(len: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.gen()).collect()
}

fn bench_soliton_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("soliton_table");
    for k in [10usize, 100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| RobustSoliton::new(black_box(k)))
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for size in [4_096usize, 65_536] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| {
                let encoder = Encoder::with_chunk_size(black_box(data), 256).unwrap();
                let count = encoder.droplet_budget(0.5);
                encoder.take(count).map(|d| d.to_wire()).count()
            })
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for size in [4_096usize, 65_536] {
        let data = payload(size);
        let encoder = Encoder::with_chunk_size(&data, 256).unwrap();
        let count = encoder.num_chunks() * 3;
        let droplets: Vec<Droplet> = encoder.take(count).collect();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &droplets, |b, droplets| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                for droplet in droplets {
                    let _ = decoder.add_droplet(droplet.clone());
                    if decoder.is_done() {
                        break;
                    }
                }
                decoder.data()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_soliton_table, bench_encode, bench_decode);
criterion_main!(benches);
