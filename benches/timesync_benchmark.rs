use criterion::{black_box, criterion_group, criterion_main, Criterion};
use station_core::timesync::{TimeSync, TimeSyncTable};

const TIMESYNC_RADIO_INTV: i64 = 2_100_000;

fn benchmark_update_timesync(c: &mut Criterion) {
    c.bench_function("update_timesync_steady_drift", |b| {
        b.iter_batched(
            TimeSyncTable::new,
            |mut table| {
                let mut ustime = 0i64;
                let mut xtime = 0i64;
                for _ in 0..40 {
                    ustime += TIMESYNC_RADIO_INTV;
                    xtime += TIMESYNC_RADIO_INTV + 3; // small synthetic drift
                    let _ = black_box(table.update_timesync(
                        0,
                        10,
                        TimeSync { ustime, xtime, pps_xtime: 0 },
                    ));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn benchmark_pps_acquisition(c: &mut Criterion) {
    c.bench_function("update_timesync_with_pps", |b| {
        b.iter_batched(
            TimeSyncTable::new,
            |mut table| {
                let mut ustime = 0i64;
                let mut xtime = 0i64;
                let mut pps = 0i64;
                for _ in 0..10 {
                    ustime += TIMESYNC_RADIO_INTV;
                    xtime += TIMESYNC_RADIO_INTV;
                    pps += 1_000_000;
                    let _ = black_box(table.update_timesync(
                        0,
                        10,
                        TimeSync { ustime, xtime, pps_xtime: pps },
                    ));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, benchmark_update_timesync, benchmark_pps_acquisition);
criterion_main!(benches);
