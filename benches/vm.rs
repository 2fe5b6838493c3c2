use criterion::{criterion_group, criterion_main, Criterion};
use futures::executor::block_on;
use wsa::ws::{Session, VmError};
use wsa::wsa::{compile_and_exit, CompileOptions, NoIncludes};

mod programs;

fn session(source: &str) -> Session {
    let text = block_on(compile_and_exit(source, &mut NoIncludes, CompileOptions::default()))
        .unwrap();
    Session::from_source(&text).unwrap()
}

pub fn reset_vm_benchmark(c: &mut Criterion) {
    let mut session = session(programs::HELLO_WORLD);
    c.bench_function("reset vm", |b| {
        b.iter(|| {
            session.restart();
        })
    });
}

pub fn hello_world_benchmark(c: &mut Criterion) {
    let mut session = session(programs::HELLO_WORLD);
    c.bench_function("hello world", |b| {
        b.iter(|| -> Result<(), VmError> {
            block_on(session.run())?;
            session.restart();

            Ok(())
        })
    });
}

pub fn count_benchmark(c: &mut Criterion) {
    let mut session = session(programs::COUNT);
    c.bench_function("count", |b| {
        b.iter(|| -> Result<(), VmError> {
            block_on(session.run())?;
            session.restart();

            Ok(())
        })
    });
}

pub fn powers_benchmark(c: &mut Criterion) {
    let mut session = session(programs::POWERS);
    c.bench_function("powers", |b| {
        b.iter(|| -> Result<(), VmError> {
            block_on(session.run())?;
            session.restart();

            Ok(())
        })
    });
}

criterion_group!(
    vm,
    count_benchmark,
    hello_world_benchmark,
    reset_vm_benchmark,
    powers_benchmark
);
criterion_main!(vm);
