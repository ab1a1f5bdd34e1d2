use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use formlogic::{
    evaluate_form, field, validate_submission, EngineConfig, Field, Form, FormBuilder,
    FormSession, InputState, NullRenderer, RuleGroup,
};

/// A chain of `n` text fields, each shown only while the previous one reads
/// "go", so a change to the first field ripples through all of them.
fn build_chain(n: u32) -> (Form, BTreeMap<u32, InputState>) {
    let mut builder = FormBuilder::new().field(Field::text(1));
    let mut snapshot = BTreeMap::new();
    snapshot.insert(1, InputState::Text("go".to_owned()));
    for id in 2..=n {
        builder = builder
            .field(Field::text(id).logic(RuleGroup::show_if_all([field(id - 1).is("go")])));
        snapshot.insert(id, InputState::Text("go".to_owned()));
    }
    (builder.compile().unwrap(), snapshot)
}

/// `n` fields that all read the same trigger.
fn build_fan_out(n: u32) -> Form {
    let mut builder = FormBuilder::new().field(Field::select(1, ["a", "b"]));
    for id in 2..=n {
        builder = builder.field(
            Field::text(id).logic(RuleGroup::show_if_any([field(1).is("a"), field(1).is("c")])),
        );
    }
    builder.compile().unwrap()
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_form");

    for &n in &[5, 20, 50] {
        let (form, snapshot) = build_chain(n);
        group.bench_function(format!("{n}_field_chain"), |b| {
            b.iter(|| evaluate_form(&form, black_box(&snapshot)));
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for &n in &[20, 100] {
        let (form, _) = build_chain(n);
        let definition = form.definition().clone();
        group.bench_function(format!("{n}_field_chain"), |b| {
            b.iter(|| Form::compile(black_box(definition.clone())).unwrap());
        });
    }

    group.finish();
}

fn bench_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_change");
    let config = EngineConfig::default().without_animation();

    for &n in &[20, 100] {
        let form = Arc::new(build_fan_out(n));
        let mut session = FormSession::new(Arc::clone(&form), config.clone(), NullRenderer);
        let now = Instant::now();
        session.init(now);
        let mut toggle = false;
        group.bench_function(format!("{n}_dependents"), |b| {
            b.iter(|| {
                toggle = !toggle;
                let value = if toggle { "b" } else { "a" };
                session.change(1, InputState::Text(value.to_owned()), now);
            });
        });
    }

    group.finish();
}

fn bench_submission(c: &mut Criterion) {
    let (form, snapshot) = build_chain(50);
    let mut session = FormSession::new(Arc::new(form), EngineConfig::default(), NullRenderer);
    for (id, value) in snapshot {
        session.live_mut().set(id, value);
    }
    session.init(Instant::now());
    let posted = session.live().to_posted();

    c.bench_function("validate_submission_50", |b| {
        b.iter(|| validate_submission(session.form(), black_box(&posted)));
    });
}

criterion_group!(benches, bench_evaluate, bench_compile, bench_session, bench_submission);
criterion_main!(benches);
