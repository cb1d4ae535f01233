use aesd::{BoundedCommandLog, CommandEntry, PartialAssembler};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn commands(count: usize) -> Vec<CommandEntry> {
    (0..count)
        .map(|i| CommandEntry::new(format!("command {} {}\n", i, "x".repeat(i % 40))).unwrap())
        .collect()
}

fn add_entry_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_entry");
    for capacity in [10, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), capacity, |b, &capacity| {
            let entries = commands(capacity * 2);
            b.iter(|| {
                let mut log = BoundedCommandLog::new(capacity);
                for entry in entries.iter().cloned() {
                    if let Some(evicted) = log.add_entry(entry) {
                        evicted.release();
                    }
                }
                black_box(log.total_size())
            })
        });
    }
    group.finish();
}

fn find_entry_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_entry_for_offset");
    for capacity in [10, 100, 1000].iter() {
        let mut log = BoundedCommandLog::new(*capacity);
        for entry in commands(*capacity) {
            if let Some(evicted) = log.add_entry(entry) {
                evicted.release();
            }
        }
        let total = log.total_size();
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &log, |b, log| {
            b.iter(|| {
                for pos in (0..total).step_by(7) {
                    black_box(log.find_entry_for_offset(pos));
                }
            })
        });
    }
    group.finish();
}

fn assembler_bench(c: &mut Criterion) {
    let stream: Vec<u8> = (0..1000)
        .map(|i| format!("command number {}\n", i))
        .collect::<String>()
        .into_bytes();
    c.bench_function("assemble 1000 commands in 512 byte chunks", |b| {
        b.iter(|| {
            let mut assembler = PartialAssembler::new();
            let mut count = 0;
            for chunk in stream.chunks(512) {
                assembler.feed(chunk).unwrap();
                count += assembler.drain_commands().len();
            }
            black_box(count)
        })
    });
}

criterion_group!(benches, add_entry_bench, find_entry_bench, assembler_bench);
criterion_main!(benches);
