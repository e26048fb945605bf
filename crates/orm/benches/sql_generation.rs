//! SQL Generation Performance Benchmarks
//!
//! Measures grammar compile throughput for representative query shapes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fluent_orm::{Grammar, OrmConfig, Query, SqlDialect};

fn bench_basic_sql_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_sql_generation");
    let grammar = Grammar::default();

    group.bench_function("simple_select", |b| {
        let query = Query::table("users").select(["id", "name", "email"]);
        b.iter(|| black_box(grammar.compile_select(&query)))
    });

    group.bench_function("select_with_where", |b| {
        let query = Query::table("users")
            .select(["id", "name", "email"])
            .where_eq("active", true)
            .where_gt("created_at", "2023-01-01");
        b.iter(|| black_box(grammar.compile_select(&query)))
    });

    group.bench_function("select_with_joins", |b| {
        let query = Query::table("users as u")
            .select(["u.id", "u.name", "p.title", "a.street"])
            .join("profiles as p", "p.user_id", "=", "u.id")
            .left_join("addresses as a", "a.user_id", "=", "u.id")
            .where_eq("u.active", true)
            .where_not_null("p.title")
            .order_by_desc("u.created_at")
            .limit(50);
        b.iter(|| black_box(grammar.compile_select(&query)))
    });

    group.finish();
}

fn bench_nested_predicates(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_predicates");
    let grammar = Grammar::default();

    for &depth in &[1usize, 4, 16] {
        let mut query = Query::table("posts");
        for level in 0..depth {
            let column = format!("c{}", level);
            query = query.where_nested(|q| q.where_eq(&column, level as i64).or_where_null(&column));
        }
        let exists = Query::table("comments").where_column("comments.post_id", "=", "posts.id");
        let query = query.where_exists(exists);

        group.bench_with_input(BenchmarkId::new("compile", depth), &query, |b, query| {
            b.iter(|| black_box(grammar.compile_select(query)))
        });
        group.bench_with_input(BenchmarkId::new("bindings", depth), &query, |b, query| {
            b.iter(|| black_box(query.get_bindings()))
        });
    }

    group.finish();
}

fn bench_in_lists(c: &mut Criterion) {
    let mut group = c.benchmark_group("in_lists");
    let grammar = Grammar::default();

    for &size in &[10usize, 100, 1000] {
        let ids: Vec<i64> = (0..size as i64).collect();
        let query = Query::table("users").where_in("users.id", ids);
        group.bench_with_input(BenchmarkId::from_parameter(size), &query, |b, query| {
            b.iter(|| black_box(grammar.compile_select(query)))
        });
    }

    group.finish();
}

fn bench_dialects(c: &mut Criterion) {
    let mut group = c.benchmark_group("dialects");
    let query = Query::table("orders")
        .select(["orders.id", "customers.name"])
        .join("customers", "customers.id", "=", "orders.customer_id")
        .where_between("orders.total", 10, 500)
        .group_by(["customers.name"])
        .having("orders.id", ">", 3);

    for dialect in [SqlDialect::PostgreSQL, SqlDialect::MySQL, SqlDialect::SQLite] {
        let grammar = Grammar::new(&OrmConfig::default().with_prefix("wp_").with_dialect(dialect));
        group.bench_with_input(BenchmarkId::from_parameter(dialect), &query, |b, query| {
            b.iter(|| black_box(grammar.compile_select(query)))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_basic_sql_generation,
    bench_nested_predicates,
    bench_in_lists,
    bench_dialects
);
criterion_main!(benches);
