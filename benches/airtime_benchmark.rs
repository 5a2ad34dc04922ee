use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use station_core::s2e::rps::{Rps, BW125, BW500, SF10, SF12, SF7};
use station_core::scheduler::airtime::{calc_air_time, calc_dn_airtime, calc_up_airtime};

fn benchmark_lora_airtime(c: &mut Criterion) {
    let mut group = c.benchmark_group("lora_airtime");

    group.bench_function("sf7_bw125_small", |b| {
        let rps = Rps::make(SF7, BW125);
        b.iter(|| calc_air_time(black_box(rps), black_box(12), black_box(true), black_box(8)))
    });

    group.bench_function("sf12_bw125_max", |b| {
        let rps = Rps::make(SF12, BW125);
        b.iter(|| calc_air_time(black_box(rps), black_box(255), black_box(true), black_box(8)))
    });

    group.bench_function("sf10_bw500", |b| {
        let rps = Rps::make(SF10, BW500);
        b.iter(|| calc_air_time(black_box(rps), black_box(64), black_box(true), black_box(8)))
    });

    for plen in [1u8, 32, 128, 255] {
        group.bench_with_input(BenchmarkId::new("dn_airtime_by_len", plen), &plen, |b, &plen| {
            let rps = Rps::make(SF7, BW125);
            b.iter(|| calc_dn_airtime(black_box(rps), black_box(plen), black_box(true), black_box(8)))
        });
    }

    group.bench_function("up_airtime_default_preamble", |b| {
        let rps = Rps::make(SF7, BW125);
        b.iter(|| calc_up_airtime(black_box(rps), black_box(32)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_lora_airtime);
criterion_main!(benches);
