use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use kiln::{EscapeMode, Heap, HeapConfig, Value};

/// Interns `count` distinct strings, then looks every one of them up again.
fn intern_strings(bench: &mut Bencher, count: usize) {
    let names: Vec<String> = (0..count).map(|i| format!("name_{i}")).collect();
    bench.iter(|| {
        let mut heap = Heap::new(HeapConfig::default()).unwrap();
        for name in &names {
            black_box(heap.intern_str(name).unwrap());
        }
        for name in &names {
            black_box(heap.intern_str(name).unwrap());
        }
        heap.free_all()
    });
}

/// Interns escaped literals that mostly already exist, exercising retraction.
fn intern_escaped_duplicates(bench: &mut Bencher) {
    bench.iter(|| {
        let mut heap = Heap::new(HeapConfig::default()).unwrap();
        for _ in 0..1000 {
            black_box(heap.intern(br#"say \"hi\""#, EscapeMode::Escaped).unwrap());
        }
        heap.free_all()
    });
}

/// Pushes `count` numbers one at a time onto a rooted array.
fn push_numbers(bench: &mut Bencher, count: u32) {
    bench.iter(|| {
        let mut heap = Heap::new(HeapConfig::default()).unwrap();
        let array = heap.new_array().unwrap();
        heap.roots_mut().stack.push(Value::Obj(array));
        for i in 0..count {
            heap.array_push(array, &[Value::Number(f64::from(i))]).unwrap();
        }
        heap.free_all()
    });
}

/// Allocates short-lived arrays under a small threshold so the collector runs often,
/// keeping every tenth one alive.
fn churn(bench: &mut Bencher, config: HeapConfig) {
    bench.iter(|| {
        let mut heap = Heap::new(config.clone()).unwrap();
        let keep = heap.new_array().unwrap();
        heap.roots_mut().stack.push(Value::Obj(keep));
        for i in 0..2000 {
            let temp = heap.new_array().unwrap();
            heap.array_push(temp, &[Value::Number(f64::from(i))]).unwrap();
            if i % 10 == 0 {
                heap.array_push(keep, &[Value::Obj(temp)]).unwrap();
            }
        }
        black_box(heap.collections());
        heap.free_all()
    });
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("intern_1000", |b| intern_strings(b, 1000));
    c.bench_function("intern_escaped_duplicates", intern_escaped_duplicates);
    c.bench_function("push_10000", |b| push_numbers(b, 10_000));
    c.bench_function("churn_threshold_16k", |b| {
        churn(b, HeapConfig::new().initial_threshold(16 * 1024));
    });
    c.bench_function("churn_stress", |b| churn(b, HeapConfig::new().stress_gc(true)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
