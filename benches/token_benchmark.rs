use criterion::{criterion_group, criterion_main, Criterion};
use fitstudio::config::Config;
use fitstudio::models::Role;
use fitstudio::services::{OtpPurpose, OtpRegistry, TokenIssuer};
use std::hint::black_box;

fn benchmark_tokens(c: &mut Criterion) {
    let issuer = TokenIssuer::from_config(&Config::test_default());
    let access = issuer
        .issue_access_token(42, Role::Student)
        .expect("Failed to issue token");

    let mut group = c.benchmark_group("tokens");

    group.bench_function("issue_access_token", |b| {
        b.iter(|| issuer.issue_access_token(black_box(42), Role::Student))
    });

    group.bench_function("verify_access_token", |b| {
        b.iter(|| issuer.verify_access_token(black_box(&access.token)))
    });

    group.finish();
}

fn benchmark_otp(c: &mut Criterion) {
    let registry = OtpRegistry::new(chrono::Duration::minutes(5));

    c.bench_function("otp_issue_and_consume", |b| {
        b.iter(|| {
            let code = registry
                .issue(black_box("09121234567"), OtpPurpose::Login)
                .expect("Failed to issue code");
            registry.verify_and_consume("09121234567", OtpPurpose::Login, &code)
        })
    });
}

criterion_group!(benches, benchmark_tokens, benchmark_otp);
criterion_main!(benches);
