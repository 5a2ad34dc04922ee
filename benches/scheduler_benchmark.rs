use criterion::{black_box, criterion_group, criterion_main, Criterion};
use station_core::region::Region;
use station_core::scheduler::Scheduler;
use station_core::txrx::TxJob;

const TX_AIM_GAP: i64 = 2_000_000;

fn make_job(n: i64, now: i64) -> TxJob {
    let mut job = TxJob::new(0x0011223344556677, n, now + TX_AIM_GAP + 1_000_000 + n * 500_000);
    job.freq = 868_100_000;
    job.rx2freq = 869_525_000;
    job.len = 12;
    job
}

fn benchmark_add_txjob(c: &mut Criterion) {
    let policy = Region::Eu868.policy();
    c.bench_function("add_txjob_single_antenna", |b| {
        b.iter_batched(
            || (Scheduler::new(0), 0i64),
            |(mut sched, now)| {
                for n in 0..8 {
                    let _ = sched.add_txjob(black_box(make_job(n, now)), policy.as_ref(), now);
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn benchmark_next_tx_action(c: &mut Criterion) {
    let policy = Region::Eu868.policy();
    c.bench_function("next_tx_action_drain", |b| {
        b.iter_batched(
            || {
                let mut sched = Scheduler::new(0);
                let now = 0i64;
                for n in 0..4 {
                    let _ = sched.add_txjob(make_job(n, now), policy.as_ref(), now);
                }
                sched
            },
            |mut sched| {
                let mut now = 0i64;
                for _ in 0..20 {
                    let _ = black_box(sched.next_tx_action(0, now));
                    now += 1_000_000;
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, benchmark_add_txjob, benchmark_next_tx_action);
criterion_main!(benches);
