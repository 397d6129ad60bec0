use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use guildgate_auth::{
    CredentialHasher, Group, HashParams, Permission, PermissionIndex, Scope, User,
};
use guildgate_core::{GroupId, UserId};

fn index_with(n: usize) -> PermissionIndex {
    let mut index = PermissionIndex::new();
    for i in 0..n {
        let scope = Scope::ALL[i % Scope::ALL.len()];
        index.add(scope, Permission::new(format!("perm.{i}"), true, i % 2 == 0, false));
    }
    index
}

fn bench_permission_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("permission_lookup");
    group.throughput(Throughput::Elements(1));

    for size in [16usize, 256, 4096] {
        let index = index_with(size);
        group.bench_with_input(BenchmarkId::new("hit", size), &index, |b, index| {
            b.iter(|| black_box(index.get(Scope::Own, black_box("perm.0"))));
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &index, |b, index| {
            b.iter(|| black_box(index.get(Scope::Global, black_box("absent"))));
        });
    }

    group.finish();
}

fn bench_group_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("group_merge");

    for groups in [1usize, 4, 16] {
        let catalog: Vec<Group> = (0..groups)
            .map(|g| Group::new(GroupId::new(g as i32 + 1), format!("g{g}")).with_permissions(index_with(64)))
            .collect();

        group.bench_with_input(BenchmarkId::new("attach_groups", groups), &catalog, |b, catalog| {
            b.iter(|| {
                let mut user = User::new(UserId::new(1), "bench", "bench@example.com", Utc::now());
                user.attach_groups(catalog.iter());
                black_box(user.permissions.count())
            });
        });
    }

    group.finish();
}

fn bench_credential_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("credential_verify");
    group.sample_size(10);

    let fast = CredentialHasher::new(HashParams::insecure_fast());
    let encoded = fast.hash("correct horse").unwrap_or_default();
    group.bench_function("insecure_fast", |b| {
        b.iter(|| black_box(fast.verify(black_box("correct horse"), &encoded)))
    });

    let production = CredentialHasher::default();
    let encoded = production.hash("correct horse").unwrap_or_default();
    group.bench_function("default_params", |b| {
        b.iter(|| black_box(production.verify(black_box("correct horse"), &encoded)))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_permission_lookup,
    bench_group_merge,
    bench_credential_verify
);
criterion_main!(benches);
