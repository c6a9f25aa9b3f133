//! This bench test populates a full requirement arena, the way a topology is
//! built at start-up, and tears it down again with a reset.

#![allow(missing_docs)]

use criterion::{Criterion, criterion_group, criterion_main};
use non_empty_string::NonEmptyString;
use pmreq::{Capabilities, Requirements};

const REQUESTERS: usize = 8;
const RESOURCES: usize = 32;

fn name(prefix: &str, i: usize) -> NonEmptyString {
    NonEmptyString::new(format!("{prefix}{i}")).unwrap()
}

fn add_many(c: &mut Criterion) {
    let mut reqs = Requirements::with_capacity(REQUESTERS * RESOURCES);
    let requesters: Vec<_> = (0..REQUESTERS)
        .map(|i| reqs.add_requester(name("cpu", i)))
        .collect();
    let resources: Vec<_> = (0..RESOURCES)
        .map(|i| reqs.add_resource(name("periph", i)))
        .collect();

    c.bench_function("add every pairing then reset", |b| {
        b.iter(|| {
            for &requester in &requesters {
                for &resource in &resources {
                    reqs.add_with_default(requester, resource, Capabilities::ACCESS)
                        .unwrap();
                }
            }
            reqs.reset_all();
        });
    });
}

criterion_group!(benches, add_many);
criterion_main!(benches);
