use std::hint::black_box;
use std::time::Instant;

use revkv_engine::RevisionStore;
use revkv_table::{FileTable, MemoryTable, RevisionTable};

fn bench_updates<T: RevisionTable>(label: &str, store: &RevisionStore<T>, iterations: u64) {
    let start = Instant::now();
    for expected in 0..iterations {
        let _ = black_box(store.put("bench", expected, black_box(b"payload")));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  {label} put ({iterations} revisions): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_gets<T: RevisionTable>(label: &str, store: &RevisionStore<T>, iterations: u32) {
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(store.get(black_box("bench")));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;
    println!("  {label} get ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_list<T: RevisionTable>(label: &str, store: &RevisionStore<T>, keys: usize, iterations: u32) {
    for i in 0..keys {
        store.put(&format!("k{i}"), 0, b"payload");
    }
    let start = Instant::now();
    for _ in 0..iterations {
        let _ = black_box(store.list());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations;
    println!("  {label} list ({keys} keys, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Revision Store Benchmarks ===\n");

    println!("Memory table:");
    let memory = RevisionStore::new(MemoryTable::new());
    bench_updates("memory", &memory, 100_000);
    bench_gets("memory", &memory, 100_000);
    bench_list("memory", &memory, 1000, 1000);

    println!("\nMemory table, auto-purge:");
    let purged = RevisionStore::with_auto_purge(MemoryTable::new(), true);
    bench_updates("memory+purge", &purged, 100_000);

    println!("\nFile table (fsync per revision):");
    let dir = std::env::temp_dir().join(format!("revkv-bench-{}", std::process::id()));
    match FileTable::open(&dir, "bench", true) {
        Ok(table) => {
            let files = RevisionStore::with_auto_purge(table, true);
            bench_updates("file+purge", &files, 500);
            bench_gets("file", &files, 5_000);
            bench_list("file", &files, 200, 50);
        }
        Err(err) => println!("  skipped: {err}"),
    }
    let _ = std::fs::remove_dir_all(&dir);

    println!("\n=== Done ===");
}
