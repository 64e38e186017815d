use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::constants::{NETWORK_ACCOUNT, POW_TARGET_TIME_SECS};
use ledger_core::{mine::mine, now_timestamp, Chain, Transaction};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn bench_pow(c: &mut Criterion) {
    c.bench_function("mine_block_difficulty_3", |b| {
        let mut rng = StdRng::seed_from_u64(42);
        let chain = Chain::with_genesis();
        let txs: Vec<Transaction> = (0..10)
            .map(|i| {
                Transaction::transfer(
                    NETWORK_ACCOUNT,
                    format!("alice-{i}"),
                    rng.gen_range(1.0..10.0),
                    now_timestamp(),
                )
            })
            .collect();

        b.iter(|| {
            let _mined = mine(&chain, txs.clone(), 3, POW_TARGET_TIME_SECS).unwrap();
        });
    });
}

criterion_group!(benches, bench_pow);
criterion_main!(benches);
