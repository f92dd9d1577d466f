//! Criterion benchmarks for the GitMsg codec hot paths: every commit in
//! every fetched repository goes through parse + clean on cache load.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gitsocial::protocol::{
    clean_content, format_message, parse_message, validate, Header, Message, Reference,
    PROTOCOL_VERSION, SOCIAL_EXT, SOCIAL_EXT_VERSION,
};

fn sample_message(references: usize) -> String {
    let reference = Reference {
        ext: SOCIAL_EXT.to_string(),
        author: "Alice Example".to_string(),
        email: "alice@example.com".to_string(),
        time: "2025-10-21T12:00:00Z".to_string(),
        target: "#commit:abc123def456".to_string(),
        version: PROTOCOL_VERSION.to_string(),
        ext_version: SOCIAL_EXT_VERSION.to_string(),
        fields: vec![("rel".to_string(), "target".to_string())],
        metadata: Some("quoted original text\nspanning two lines".to_string()),
    };

    let message = Message {
        content: "A medium-length post body.\n\nWith a second paragraph that talks \
                  about something mildly interesting."
            .to_string(),
        header: Header::new(SOCIAL_EXT)
            .with_field("type", "quote")
            .with_field("lang", "en"),
        references: vec![reference; references],
    };
    format_message(&message)
}

fn bench_parse(c: &mut Criterion) {
    let plain = sample_message(0);
    let with_refs = sample_message(3);
    let implicit = "just a plain commit message\n\nwith no protocol framing at all";

    c.bench_function("parse_message/no_refs", |b| {
        b.iter(|| parse_message(black_box(&plain)))
    });
    c.bench_function("parse_message/three_refs", |b| {
        b.iter(|| parse_message(black_box(&with_refs)))
    });
    c.bench_function("parse_message/implicit_miss", |b| {
        b.iter(|| parse_message(black_box(implicit)))
    });
}

fn bench_roundtrip(c: &mut Criterion) {
    let text = sample_message(2);
    let message = parse_message(&text).expect("sample parses");

    c.bench_function("format_message/two_refs", |b| {
        b.iter(|| format_message(black_box(&message)))
    });
    c.bench_function("validate/two_refs", |b| {
        b.iter(|| validate(black_box(&message)))
    });
}

fn bench_clean_content(c: &mut Criterion) {
    let text = sample_message(3);
    c.bench_function("clean_content/three_refs", |b| {
        b.iter(|| clean_content(black_box(&text)))
    });
}

criterion_group!(benches, bench_parse, bench_roundtrip, bench_clean_content);
criterion_main!(benches);
