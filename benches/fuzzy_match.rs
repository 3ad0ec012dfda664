use criterion::{black_box, criterion_group, criterion_main, Criterion};
use llpg_match::similarity::trigram_similarity;
use llpg_match::validator::Validator;

fn bench_trigram_similarity(c: &mut Criterion) {
    let source = "14 High Street, Alton, GU34 1AB";
    let candidate = "14 High St, Alton, Hampshire, GU34 1AB";
    c.bench_function("trigram_similarity", |b| {
        b.iter(|| trigram_similarity(black_box(source), black_box(candidate)))
    });
}

fn bench_validator_validate(c: &mut Criterion) {
    let source = "22 Mill Ln, Liss, Hants, GU33 7AA";
    let candidate = "22 Mill Lane, Liss, Hampshire, GU33 7AA";
    c.bench_function("validator_validate", |b| {
        b.iter(|| Validator::validate(black_box(source), black_box(candidate)))
    });
}

criterion_group!(benches, bench_trigram_similarity, bench_validator_validate);
criterion_main!(benches);
