//! Benchmark harness using Criterion for latency measurement.
//!
//! Measures:
//! - Submit order (no match)
//! - Submit order (full match)
//! - Cancel order
//! - All-or-none fillability probe
//! - Mixed seeded workload

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use reflex_lob::{Book, Order, Side};

/// Benchmark: submit an order that rests (no matching)
fn bench_submit_no_match(c: &mut Criterion) {
    let book = Book::new();
    book.submit(&Order::limit(Side::Ask, 10_100.0, 100.0));

    c.bench_function("submit_no_match", |b| {
        b.iter(|| {
            let order = Order::limit(Side::Bid, 9_000.0, 100.0);
            book.submit(black_box(&order));
        })
    });
}

/// Benchmark: submit an order that fully matches a resting one
fn bench_submit_full_match(c: &mut Criterion) {
    let book = Book::new();

    c.bench_function("submit_full_match", |b| {
        b.iter(|| {
            book.submit(&Order::limit(Side::Ask, 10_000.0, 100.0));
            let taker = Order::limit(Side::Bid, 10_000.0, 100.0);
            book.submit(black_box(&taker));
        })
    });
}

/// Benchmark: cancel a resting order
fn bench_cancel(c: &mut Criterion) {
    let book = Book::new();

    c.bench_function("cancel", |b| {
        b.iter_batched(
            || {
                let order = Order::limit(Side::Bid, 10_000.0, 100.0);
                book.submit(&order);
                order
            },
            |order| black_box(order.cancel()),
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark: the pure fillability probe on an unfillable AON
/// (submitted immediate-or-cancel so the book is left untouched)
fn bench_aon_probe(c: &mut Criterion) {
    let book = Book::new();
    for i in 0..50 {
        book.submit(&Order::limit(Side::Ask, 10_000.0 + i as f64, 50.0));
    }

    c.bench_function("aon_probe_unfillable", |b| {
        b.iter(|| {
            let probe = Order::builder(Side::Bid, 10_049.0, 1_000_000.0)
                .all_or_nothing()
                .immediate_or_cancel()
                .build();
            book.submit(black_box(&probe));
        })
    });
}

/// Benchmark: seeded mixed workload of submissions and cancels
fn bench_mixed_workload(c: &mut Criterion) {
    c.bench_function("mixed_workload_1k", |b| {
        b.iter_batched(
            || ChaCha8Rng::seed_from_u64(0xFEEDFACE),
            |mut rng| {
                let book = Book::new();
                let mut active = Vec::new();
                for _ in 0..1_000 {
                    active.retain(|order: &std::rc::Rc<Order>| order.is_queued());
                    if active.is_empty() || rng.gen_bool(0.7) {
                        let side = if rng.gen_bool(0.5) { Side::Bid } else { Side::Ask };
                        let price = rng.gen_range(9_900..10_100) as f64;
                        let qty = rng.gen_range(1..1_000) as f64;
                        let order = Order::limit(side, price, qty);
                        book.submit(&order);
                        if order.is_queued() {
                            active.push(order);
                        }
                    } else {
                        let idx = rng.gen_range(0..active.len());
                        active.swap_remove(idx).cancel();
                    }
                }
                black_box(book.last_trade_price())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_submit_no_match,
    bench_submit_full_match,
    bench_cancel,
    bench_aon_probe,
    bench_mixed_workload
);
criterion_main!(benches);
