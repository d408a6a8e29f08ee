//! Evaluate benchmarks - condition checks, the hot path.
//!
//! Measures: path lookup, single value conditions, And/Or/Not composition,
//! regex matching on pathological input, and trace overhead.

use evroute::prelude::*;
use evroute::{lookup, RegexFlags};
use serde_json::json;

fn main() {
    divan::main();
}

fn nested_event(depth: usize) -> Event {
    (0..depth).rev().fold(json!("leaf"), |inner, i| {
        let mut map = serde_json::Map::new();
        map.insert(format!("k{i}"), inner);
        Event::Object(map)
    })
}

fn nested_path(depth: usize) -> String {
    (0..depth).map(|i| format!("k{i}")).collect::<Vec<_>>().join(".")
}

// ═══════════════════════════════════════════════════════════════════════════════
// Path lookup
// ═══════════════════════════════════════════════════════════════════════════════

#[divan::bench(args = [1, 4, 16])]
fn lookup_found(bencher: divan::Bencher, depth: usize) {
    let event = nested_event(depth);
    let path = ValuePath::parse(&nested_path(depth));

    bencher.bench_local(|| lookup(&event, &path));
}

#[divan::bench]
fn lookup_absent(bencher: divan::Bencher) {
    let event = nested_event(8);
    let path = ValuePath::parse("k0.k1.missing.k3");

    bencher.bench_local(|| lookup(&event, &path));
}

#[divan::bench]
fn path_parse(bencher: divan::Bencher) {
    bencher.bench_local(|| ValuePath::parse("detail.order.items.count"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Single value conditions
// ═══════════════════════════════════════════════════════════════════════════════

#[divan::bench]
fn equals_hit(bencher: divan::Bencher) {
    let condition = Condition::value("a.b").equals("TEST");
    let event = json!({"a": {"b": "TEST"}});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench]
fn equals_absent(bencher: divan::Bencher) {
    let condition = Condition::value("a.b").equals("TEST");
    let event = json!({"x": 1});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench(args = [4, 64, 256])]
fn one_of_miss(bencher: divan::Bencher, n: usize) {
    let condition = Condition::value("a").one_of((0..n).map(|i| format!("opt{i}")));
    let event = json!({"a": "none"});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench]
fn chained_predicates(bencher: divan::Bencher) {
    let condition = Condition::value("items").is_not_empty().contains([3]).is_length(5);
    let event = json!({"items": [1, 2, 3, 4, 5]});

    bencher.bench_local(|| condition.check(&event));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Composition
// ═══════════════════════════════════════════════════════════════════════════════

#[divan::bench(args = [2, 8, 32])]
fn and_all_true(bencher: divan::Bencher, n: usize) {
    let condition = Condition::all((0..n).map(|i| Condition::value(format!("k{i}")).is_truthy()));
    let event: Event = (0..n)
        .map(|i| (format!("k{i}"), json!(true)))
        .collect::<serde_json::Map<_, _>>()
        .into();

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench(args = [2, 8, 32])]
fn or_first_true(bencher: divan::Bencher, n: usize) {
    let condition = Condition::any((0..n).map(|i| Condition::value(format!("k{i}")).is_truthy()));
    let event = json!({"k0": true});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench]
fn deep_not(bencher: divan::Bencher) {
    let condition = (0..31).fold(Condition::from(Condition::value("a").is_truthy()), |c, _| !c);
    let event = json!({"a": 1});

    bencher.bench_local(|| condition.check(&event));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Regex
// ═══════════════════════════════════════════════════════════════════════════════

/// `(a+)+$` backtracks exponentially on `aaa…b` in backtracking engines; the
/// `regex` crate stays linear.
#[divan::bench(args = [10, 25, 100])]
fn regex_pathological(bencher: divan::Bencher, n: usize) {
    let condition = Condition::value("s").match_regex("(a+)+$").unwrap();
    let event = json!({"s": format!("{}b", "a".repeat(n))});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench]
fn regex_full_match(bencher: divan::Bencher) {
    let flags = RegexFlags {
        full_match: true,
        ignore_case: true,
        ..RegexFlags::default()
    };
    let condition = Condition::value("id").match_regex_with(r"user-\d+", flags).unwrap();
    let event = json!({"id": "USER-12345"});

    bencher.bench_local(|| condition.check(&event));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Trace overhead
// ═══════════════════════════════════════════════════════════════════════════════

#[divan::bench]
fn check_plain(bencher: divan::Bencher) {
    let condition = (Condition::value("a").equals(1) | Condition::value("b").equals(2))
        & !Condition::value("c").is_truthy();
    let event = json!({"a": 1, "c": false});

    bencher.bench_local(|| condition.check(&event));
}

#[divan::bench]
fn check_with_trace(bencher: divan::Bencher) {
    let condition = (Condition::value("a").equals(1) | Condition::value("b").equals(2))
        & !Condition::value("c").is_truthy();
    let event = json!({"a": 1, "c": false});

    bencher.bench_local(|| condition.check_with_trace(&event));
}
