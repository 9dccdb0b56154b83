use criterion::{criterion_group, criterion_main, Criterion};
use secp256k1_compat::{CapabilityTier, Dispatcher, ResultCode, SignOptions};

const MESSAGE: &'static [u8; 32] = b"hello world you are beautiful!!!";
const SK: &'static [u8; 32] = b"xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx";

lazy_static::lazy_static! {
    static ref NATIVE: Dispatcher = Dispatcher::for_capability(CapabilityTier::Native);
    static ref PORTABLE: Dispatcher = Dispatcher::for_capability(CapabilityTier::Portable);
}

fn tiers() -> [(&'static str, &'static Dispatcher); 2] {
    [("native", &*NATIVE), ("portable", &*PORTABLE)]
}

fn sign(secp: &Dispatcher) -> [u8; 64] {
    let mut sig = [0u8; 64];
    let mut recovery_id = 0;
    assert_eq!(
        secp.ecdsa_sign(&mut sig, &mut recovery_id, MESSAGE, SK, SignOptions::default()),
        ResultCode::Ok
    );
    sig
}

fn ecdsa_sign(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecdsa_sign");
    for (name, secp) in tiers() {
        group.bench_function(name, |b| b.iter(|| sign(secp)));
    }
}

fn ecdsa_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecdsa_verify");
    for (name, secp) in tiers() {
        let sig = sign(secp);
        let mut pubkey = [0u8; 33];
        assert_eq!(secp.public_key_create(&mut pubkey, SK), Ok(ResultCode::Ok));
        group.bench_function(name, |b| {
            b.iter(|| secp.ecdsa_verify(&sig, MESSAGE, &pubkey))
        });
    }
}

/// Combine is served by the reference backend on every tier so this measures
/// the cost of falling back.
fn public_key_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("public_key_combine");
    for (name, secp) in tiers() {
        let mut pubkey = [0u8; 33];
        assert_eq!(secp.public_key_create(&mut pubkey, SK), Ok(ResultCode::Ok));
        group.bench_function(name, |b| {
            b.iter(|| {
                let mut output = [0u8; 33];
                secp.public_key_combine(&mut output, &[&pubkey[..], &pubkey[..]])
            })
        });
    }
}

criterion_group!(benches, ecdsa_sign, ecdsa_verify, public_key_combine);
criterion_main!(benches);
