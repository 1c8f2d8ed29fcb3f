use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sample_buffer::{ImuSample, SampleBuffer};

fn bench_push_and_query(c: &mut Criterion) {
    let mut buffer = SampleBuffer::with_default_capacity();
    let mut ts = 0u32;

    c.bench_function("push + stats (capacity 10)", |b| {
        b.iter(|| {
            ts = ts.wrapping_add(10);
            let g = 1.0 + (ts % 70) as f32 / 100.0;
            buffer.push(ImuSample::new(ts, [0.0, 0.0, g], [0.0, 0.0, 5.0]));
            black_box((
                buffer.moving_average_magnitude(),
                buffer.peak_magnitude(),
                buffer.peak_jerk(),
            ))
        })
    });
}

criterion_group!(benches, bench_push_and_query);
criterion_main!(benches);
