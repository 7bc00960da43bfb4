use aro::lexer::Lexer;
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const SOURCE: &str = r#"
(F: Orders Summary) {
    <Extract> the <rows> from the <orders_file>.
    <Filter> the <open_rows> from the <rows> where status = "open".
    <Reduce> the <total> from the <open_rows> with sum(amount).
    for each row in <open_rows> {
        <Log> the <row> to the <console>.
    }
    Publish as <OrderTotal> <total>.
}
"#;

fn bench_lex_one_feature_set(c: &mut Criterion) {
    c.bench_function("lexer/one_feature_set", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(black_box(SOURCE));
            let mut count = 0usize;
            loop {
                let token = lexer.next_token();
                count += 1;
                if token.kind == aro::lexer::TokenKind::Eof {
                    break;
                }
            }
            black_box(count);
        });
    });
}

fn bench_lex_repeated_source(c: &mut Criterion) {
    let large = SOURCE.repeat(200);
    c.bench_function("lexer/two_hundred_feature_sets", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(black_box(&large));
            let mut count = 0usize;
            loop {
                let token = lexer.next_token();
                count += 1;
                if token.kind == aro::lexer::TokenKind::Eof {
                    break;
                }
            }
            black_box(count);
        });
    });
}

criterion_group!(benches, bench_lex_one_feature_set, bench_lex_repeated_source);
criterion_main!(benches);
