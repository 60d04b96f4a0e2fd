use std::{process::ExitCode, time::Instant};

use clap::{Parser, Subcommand};
use kiln::{BuiltinModule, EscapeMode, Heap, HeapConfig, HeapResult, HeapStats, Value};

#[derive(Parser)]
#[command(name = "kiln", about = "Drive the kiln heap with a synthetic workload", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Allocate objects the way a running script would and report heap statistics.
    Run {
        /// Loop iterations; each one allocates an instance, two strings and an array.
        #[arg(long, default_value_t = 1000)]
        iterations: u32,
        /// Collectable bytes that trigger the first collection.
        #[arg(long, default_value_t = kiln::DEFAULT_INITIAL_THRESHOLD)]
        threshold: usize,
        /// Multiplier applied to live bytes to get the next threshold.
        #[arg(long, default_value_t = kiln::DEFAULT_GROWTH_FACTOR)]
        growth_factor: usize,
        /// Collect before every collectable allocation.
        #[arg(long)]
        stress_gc: bool,
        /// Ceiling on live bytes across both arenas.
        #[arg(long)]
        max_memory: Option<usize>,
        /// Print statistics as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Push numbers onto one array and print every capacity change.
    Grow {
        #[arg(long)]
        to: u32,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.cmd {
        Command::Run {
            iterations,
            threshold,
            growth_factor,
            stress_gc,
            max_memory,
            json,
        } => {
            let mut config = HeapConfig::new()
                .initial_threshold(threshold)
                .growth_factor(growth_factor)
                .stress_gc(stress_gc);
            if let Some(limit) = max_memory {
                config = config.max_memory(limit);
            }
            run(config, iterations, json)
        }
        Command::Grow { to } => grow(to),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: HeapConfig, iterations: u32, json: bool) -> HeapResult<()> {
    let start = Instant::now();
    let mut heap = Heap::new(config)?;
    let base = heap.roots().stack.len();

    let class_name = heap.intern_str("Point")?;
    let class = heap.new_class(class_name)?;
    heap.roots_mut().stack.push(Value::Obj(class));
    let points = heap.new_array()?;
    heap.roots_mut().stack.push(Value::Obj(points));
    heap.define_global("points", Value::Obj(points))?;

    let x = heap.intern_str("x")?;
    let y = heap.intern_str("y")?;
    let label = heap.intern_str("label")?;
    let prefix = heap.intern(br#"\"point\" "#, EscapeMode::Escaped)?;
    let getter = heap.new_function()?;
    let getter_name = heap.intern_str("getX")?;
    heap.with_function_mut(getter, |f| {
        f.upvalue_count = 1;
        f.name = Some(getter_name);
    });
    heap.write_chunk(getter, 0x01, 1)?;

    let push = heap
        .builtin_native(BuiltinModule::Array, "push")
        .expect("kiln: array.push is always installed");

    for i in 0..iterations {
        let n = f64::from(i);
        heap.find_or_create_constant_slot(Value::Number(n % 64.0))?;

        let point = heap.new_instance(class)?;
        heap.roots_mut().stack.push(Value::Obj(point));
        heap.set_field(point, x, Value::Number(n))?;
        heap.set_field(point, y, Value::Number(-n))?;
        let digits = heap.intern_str(&(i % 100).to_string())?;
        let name = heap.concat(prefix, digits)?;
        heap.set_field(point, label, Value::Obj(name))?;

        // a short-lived buffer the collector reclaims
        let scratch = heap.new_array()?;
        heap.array_resize(scratch, u64::from(i % 32))?;

        // capture the point the way a closure over a local would, then close over it
        let closure = heap.new_closure(getter)?;
        heap.roots_mut().stack.push(Value::Obj(closure));
        let slot = heap.roots().stack.len() - 2;
        let upvalue = heap.new_upvalue(slot)?;
        heap.closure_mut(closure).upvalues[0] = Some(upvalue);
        heap.close_upvalue(upvalue, Value::Obj(point));

        if i % 16 == 0 {
            heap.call_native(push, &[Value::Obj(points), Value::Obj(point)])?;
        }
        heap.roots_mut().stack.truncate(base + 2);
    }

    if let Some(first) = heap.array_get(points, 0) {
        log::info!("first point: {}", heap.format_value(first, true));
    }
    heap.roots_mut().stack.truncate(base);
    heap.collect_garbage();
    let elapsed = start.elapsed();
    let stats = heap.heap_stats();

    if json {
        let report = serde_json::json!({
            "stats": stats,
            "last_gc": heap.last_gc(),
            "elapsed_us": u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        });
        println!("{report:#}");
    } else {
        print_stats(&stats);
        if let Some(gc) = heap.last_gc() {
            println!(
                "last gc: {} freed {} objects ({} bytes), next at {}",
                <&'static str>::from(gc.reason),
                gc.freed_objects,
                gc.freed_bytes,
                gc.next_threshold
            );
        }
        println!("time taken: {elapsed:?}");
    }

    let released = heap.free_all();
    log::debug!(
        "released {} collectable and {} immortal objects",
        released.collectable_objects,
        released.immortal_objects
    );
    Ok(())
}

fn print_stats(stats: &HeapStats) {
    println!("collections: {}", stats.collections);
    for (name, arena) in [("collectable", &stats.collectable), ("immortal", &stats.immortal)] {
        println!(
            "{name}: {} objects, {} bytes, {} free slots",
            arena.live_objects, arena.bytes, arena.free_slots
        );
    }
    for (type_name, count) in &stats.objects_by_type {
        println!("  {type_name}: {count}");
    }
    println!("interned strings: {}", stats.interned_strings);
    println!("constants: {}", stats.constants);
    println!("next gc at: {} bytes", stats.next_gc);
}

fn grow(to: u32) -> HeapResult<()> {
    let mut heap = Heap::new(HeapConfig::default())?;
    let array = heap.new_array()?;
    heap.roots_mut().stack.push(Value::Obj(array));

    let mut capacity = heap.array(array).capacity();
    for i in 0..to {
        let length = heap.array_push(array, &[Value::Number(f64::from(i))])?;
        let grown = heap.array(array).capacity();
        if grown != capacity {
            println!("length {length}: capacity {capacity} -> {grown}");
            capacity = grown;
        }
    }
    println!("{} bytes for {to} elements", heap.object_size(array));
    Ok(())
}
