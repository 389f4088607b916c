use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ton_core::{
    lexer::Lexer, parse, serialize_with_options, validate_embedded, TonParser, TonSerializeOptions,
};

// ============================================================================
// Test Data: Varying Complexity and Size
// ============================================================================

const TINY_TON: &str = "{ value = 42 }";

const SMALL_TON: &str = "\
{
    name = 'test',
    version = 1.0,
    enabled = true,
    tags = ['a', 'b', 'c']
}";

const MEDIUM_TON: &str = "\
#! enum(Status) [active, inactive, pending]
#! { (Server) host = string(required), port = int(range(1, 65535)), status = enum:Status }
{
    defaults = { ssl = true, retries = 5, timeout = 30 },
    servers = [
        (Server) { host = 'server1.com', port = 8080, status = |active| },
        (Server) { host = 'server2.com', port = 8081, status = |active| },
        (Server) { host = 'server3.com', port = 8082, status = |inactive| }
    ],
    production = Server { host = 'prod.example.com', port = 443, status = |active| }
}";

const LARGE_TON: &str = "\
#! enum(Permission) [read, write, execute, admin]
#! { (User) id = int(positive), name = string(required, minLength(2)),
#!   email = string(format(email)), roles = array:string(unique) }
{
    users = [
        (User#1) { id = 1, name = 'Admin', email = 'admin@example.com', roles = ['admin', 'superuser'] },
        (User#2) { id = 2, name = 'Alice', email = 'alice@example.com', roles = ['developer', 'reviewer'] },
        (User#3) { id = 3, name = 'Bob', email = 'bob@example.com', roles = ['developer'] },
        (User#4) { id = 4, name = 'Charlie', email = 'charlie@example.com', roles = ['viewer'] },
        (User#5) { id = 5, name = 'David', email = 'david@example.com', roles = ['developer', 'ops'] }
    ],
    resources = [
        { path = '/api/users', permissions = |read|write| },
        { path = '/api/admin', permissions = |admin| },
        { path = '/api/metrics', permissions = |read| },
        { path = '/api/config', permissions = |read|write|admin| }
    ],
    system_config = {
        api_version = '2.0',
        debug = false,
        max_connections = 1000,
        timeout_seconds = 30,
        session = 550e8400-e29b-41d4-a716-446655440000,
        cache = { enabled = true, ttl = 3600, max_size = 10485760 },
        logging = { level = 'info', format = 'json', output = 'stdout' }
    }
}";

// Generate very large TON for stress testing
fn generate_xlarge_ton(array_size: usize) -> String {
    let mut ton = String::from("{\n    items = [\n");
    for i in 0..array_size {
        ton.push_str(&format!(
            "        {{ id = {}, name = 'Item {}', value = {}, active = {} }}{}\n",
            i,
            i,
            i * 100,
            i % 2 == 0,
            if i + 1 < array_size { "," } else { "" }
        ));
    }
    ton.push_str("    ]\n}");
    ton
}

// ============================================================================
// Lexer Benchmarks
// ============================================================================

fn bench_lexer_tiny(c: &mut Criterion) {
    c.bench_function("lexer_tiny", |b| {
        b.iter(|| {
            let mut lexer = Lexer::new(black_box(TINY_TON));
            lexer.tokenize()
        })
    });
}

fn bench_lexer_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("lexer_by_size");

    for (name, source) in [
        ("tiny", TINY_TON),
        ("small", SMALL_TON),
        ("medium", MEDIUM_TON),
        ("large", LARGE_TON),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| {
                let mut lexer = Lexer::new(black_box(src));
                lexer.tokenize()
            })
        });
    }

    group.finish();
}

// ============================================================================
// Parser Benchmarks
// ============================================================================

fn bench_parser_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_by_size");

    for (name, source) in [
        ("tiny", TINY_TON),
        ("small", SMALL_TON),
        ("medium", MEDIUM_TON),
        ("large", LARGE_TON),
    ] {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), source, |b, src| {
            b.iter(|| TonParser::new().parse(black_box(src)))
        });
    }

    group.finish();
}

fn bench_parser_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_array_scaling");

    for size in [10, 50, 100, 500, 1000] {
        let source = generate_xlarge_ton(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &source, |b, src| {
            b.iter(|| TonParser::new().parse(black_box(src)))
        });
    }

    group.finish();
}

// ============================================================================
// Serializer Benchmarks
// ============================================================================

fn bench_serializer_styles(c: &mut Criterion) {
    let mut group = c.benchmark_group("serializer_by_style");
    let doc = parse(LARGE_TON).unwrap();

    group.bench_function("compact", |b| {
        b.iter(|| serialize_with_options(black_box(&doc), TonSerializeOptions::compact()))
    });
    group.bench_function("pretty", |b| {
        b.iter(|| serialize_with_options(black_box(&doc), TonSerializeOptions::pretty()))
    });

    group.finish();
}

// ============================================================================
// Validator Benchmarks
// ============================================================================

fn bench_validator(c: &mut Criterion) {
    let mut group = c.benchmark_group("validator");

    for (name, source) in [("medium", MEDIUM_TON), ("large", LARGE_TON)] {
        let doc = parse(source).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &doc, |b, doc| {
            b.iter(|| validate_embedded(black_box(doc)))
        });
    }

    group.finish();
}

// ============================================================================
// End-to-End Benchmarks
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    c.bench_function("round_trip_large", |b| {
        b.iter(|| {
            let doc = parse(black_box(LARGE_TON)).unwrap();
            serialize_with_options(&doc, TonSerializeOptions::pretty())
        })
    });
}

criterion_group!(
    benches,
    bench_lexer_tiny,
    bench_lexer_sizes,
    bench_parser_sizes,
    bench_parser_scaling,
    bench_serializer_styles,
    bench_validator,
    bench_round_trip
);
criterion_main!(benches);
