//! Argon2 密码哈希与登录路径性能基准测试

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use linkhub::auth::JwtService;
use linkhub::config::AuthSettings;
use linkhub::services::AccountService;
use linkhub::storage::MemoryStorage;
use linkhub::utils::password::{dummy_verify, hash_password, is_argon2_hash, verify_password};

fn bench_hash_password(c: &mut Criterion) {
    c.bench_function("password/hash", |b| {
        b.iter(|| {
            let _ = hash_password("test_password_123");
        });
    });
}

fn bench_verify_password(c: &mut Criterion) {
    let password = "correct_password_456";
    let hash = hash_password(password).expect("hash should succeed");

    let mut group = c.benchmark_group("password/verify");

    group.bench_function("correct", |b| {
        b.iter(|| {
            assert!(verify_password(password, &hash).expect("verify should succeed"));
        });
    });

    group.bench_function("wrong", |b| {
        b.iter(|| {
            assert!(!verify_password("wrong_password", &hash).expect("verify should succeed"));
        });
    });

    // 未知邮箱走的路径，耗时应与 wrong 接近
    group.bench_function("dummy", |b| {
        b.iter(|| dummy_verify("wrong_password"));
    });

    group.finish();
}

fn bench_is_argon2_hash(c: &mut Criterion) {
    let valid_hash = "$argon2id$v=19$m=19456,t=2,p=1$somesaltvalue$somehashvalue";

    c.bench_function("password/is_argon2_hash", |b| {
        b.iter(|| {
            assert!(is_argon2_hash(valid_hash));
            assert!(!is_argon2_hash("plaintext_password"));
        });
    });
}

/// 已知邮箱和未知邮箱的登录失败耗时对比
fn bench_login_failures(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let jwt = Arc::new(JwtService::new("bench-secret-0123456789abcdef", 60));
    let accounts = AccountService::new(storage, jwt, AuthSettings::default());
    rt.block_on(accounts.register("known@example.com", "secret1"))
        .unwrap();

    let mut group = c.benchmark_group("password/login_failure");

    group.bench_function("known_email", |b| {
        b.to_async(&rt).iter(|| async {
            assert!(accounts.login("known@example.com", "wrong!").await.is_err());
        });
    });

    group.bench_function("unknown_email", |b| {
        b.to_async(&rt).iter(|| async {
            assert!(accounts.login("nobody@example.com", "wrong!").await.is_err());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_hash_password,
    bench_verify_password,
    bench_is_argon2_hash,
    bench_login_failures,
);
criterion_main!(benches);
