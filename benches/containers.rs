//! Container benchmarks for cellar
//!
//! These benchmarks measure the hot paths of the packed containers and the
//! dictionary: end pushes, lookups, and the incremental-rehash insert path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box as hint_black_box;

use cellar::{BytesDictType, Dict, End, IntSet, PackedList};

fn bench_packedlist_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("packedlist_push");

    let payloads: Vec<(&[u8], &str)> = vec![
        (b"12", "imm_int"),
        (b"4096", "int16"),
        (b"123456789012", "int64"),
        (b"short string", "small_string"),
    ];

    for (payload, name) in payloads {
        group.bench_with_input(BenchmarkId::new("tail", name), payload, |b, payload| {
            b.iter(|| {
                let mut list = PackedList::new();
                for _ in 0..64 {
                    list.push(End::Tail, black_box(payload));
                }
                hint_black_box(list.blob_len())
            });
        });
    }

    group.finish();
}

fn bench_packedlist_index(c: &mut Criterion) {
    let mut list = PackedList::new();
    for i in 0..256 {
        list.push(End::Tail, format!("value-{i}").as_bytes());
    }

    let mut group = c.benchmark_group("packedlist_index");
    group.bench_function("front", |b| {
        b.iter(|| hint_black_box(list.index(black_box(10))))
    });
    group.bench_function("back", |b| {
        b.iter(|| hint_black_box(list.index(black_box(-10))))
    });
    group.finish();
}

fn bench_intset(c: &mut Criterion) {
    let mut group = c.benchmark_group("intset");

    group.bench_function("add_1024_sequential", |b| {
        b.iter(|| {
            let mut set = IntSet::new();
            for v in 0..1024i64 {
                set.add(black_box(v));
            }
            hint_black_box(set.blob_len())
        });
    });

    let mut set = IntSet::new();
    for v in 0..4096i64 {
        set.add(v * 7);
    }
    group.bench_function("find_hit", |b| {
        b.iter(|| hint_black_box(set.find(black_box(7 * 1234))))
    });
    group.bench_function("find_miss", |b| {
        b.iter(|| hint_black_box(set.find(black_box(5))))
    });

    group.finish();
}

fn bench_dict(c: &mut Criterion) {
    let mut group = c.benchmark_group("dict");

    group.bench_function("insert_4096", |b| {
        b.iter(|| {
            let mut dict: Dict<Vec<u8>, u64, BytesDictType> =
                Dict::with_type(BytesDictType::with_seed(7));
            for i in 0..4096u64 {
                dict.add(i.to_le_bytes().to_vec(), i).unwrap();
            }
            hint_black_box(dict.len())
        });
    });

    let mut dict: Dict<Vec<u8>, u64, BytesDictType> =
        Dict::with_type(BytesDictType::with_seed(7));
    for i in 0..16_384u64 {
        dict.add(i.to_le_bytes().to_vec(), i).unwrap();
    }
    group.bench_function("find_hit", |b| {
        let key = 9999u64.to_le_bytes().to_vec();
        b.iter(|| hint_black_box(dict.find(black_box(&key))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_packedlist_push,
    bench_packedlist_index,
    bench_intset,
    bench_dict
);
criterion_main!(benches);
