//! Criterion benchmarks for SHADE crypto: keygen, encrypt, decrypt, stealth derivation, meta signing.

use alloy::primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use shade_crypto::derive;
use shade_crypto::{sign_withdraw, EncryptedPayload, KeyPair, RandomNumber, WithdrawAuthorization};

fn bench_keygen(c: &mut Criterion) {
    let mut g = c.benchmark_group("keygen");
    g.throughput(Throughput::Elements(1));
    g.bench_function("generate_keypair", |b| {
        b.iter(|| black_box(KeyPair::generate()));
    });
    g.bench_function("random_number", |b| {
        b.iter(|| black_box(RandomNumber::generate()));
    });
    g.finish();
}

fn bench_encrypt(c: &mut Criterion) {
    let viewing = KeyPair::generate().to_public();
    let r = RandomNumber::generate();
    let mut g = c.benchmark_group("encrypt");
    g.throughput(Throughput::Elements(1));
    g.bench_function("encrypt", |b| {
        b.iter(|| black_box(viewing.encrypt(&r)).unwrap());
    });
    g.finish();
}

fn bench_decrypt(c: &mut Criterion) {
    let viewing = KeyPair::generate();
    let payload = viewing.encrypt(&RandomNumber::generate()).unwrap();
    let pkx = payload.pkx();
    let mut g = c.benchmark_group("decrypt");
    g.throughput(Throughput::Elements(1));
    g.bench_function("decrypt", |b| {
        b.iter(|| black_box(viewing.decrypt(&payload)).unwrap());
    });
    g.bench_function("decrypt_from_announcement", |b| {
        b.iter(|| {
            let rebuilt = EncryptedPayload::from_announcement(&pkx, &payload.ciphertext).unwrap();
            black_box(viewing.decrypt(&rebuilt)).unwrap()
        });
    });
    g.finish();
}

fn bench_stealth_derivation(c: &mut Criterion) {
    let spending = KeyPair::generate();
    let spending_public = spending.to_public();
    let r = RandomNumber::generate();

    let mut g = c.benchmark_group("stealth_derivation");
    g.throughput(Throughput::Elements(1));
    g.bench_function("derive_stealth_address", |b| {
        b.iter(|| black_box(derive::derive_stealth_address(&spending_public, &r)).unwrap());
    });
    g.bench_function("derive_stealth_private_key", |b| {
        b.iter(|| black_box(derive::derive_stealth_private_key(&spending, &r)).unwrap());
    });
    g.finish();
}

fn bench_meta_withdraw(c: &mut Criterion) {
    let stealth = KeyPair::generate();
    let auth = WithdrawAuthorization::new(
        1,
        Address::repeat_byte(1),
        Address::repeat_byte(2),
        Address::repeat_byte(3),
        Address::repeat_byte(4),
        U256::from(10u64),
    );
    let mut g = c.benchmark_group("meta_withdraw");
    g.throughput(Throughput::Elements(1));
    g.bench_function("sign_withdraw", |b| {
        b.iter(|| black_box(sign_withdraw(&stealth, &auth)).unwrap());
    });
    g.finish();
}

criterion_group!(
    benches,
    bench_keygen,
    bench_encrypt,
    bench_decrypt,
    bench_stealth_derivation,
    bench_meta_withdraw
);
criterion_main!(benches);
