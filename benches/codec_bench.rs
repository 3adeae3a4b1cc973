use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use hessian2::{encode, Decoder, ListValue, MapValue, Value};

fn sample_value(size: usize) -> Value {
    let items: Vec<Value> = (0..size as i32)
        .map(|i| {
            Value::Map(MapValue::untyped(vec![
                (Value::string("id"), Value::Int32(i)),
                (Value::string("name"), Value::string(format!("item-{i}"))),
                (Value::string("active"), Value::Bool(i % 2 == 0)),
                (Value::string("created"), Value::Date(Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64).unwrap())),
                (Value::string("blob"), Value::binary(vec![i as u8; 16])),
            ]))
        })
        .collect();
    Value::List(ListValue::untyped(items))
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &size in &[8usize, 64, 512] {
        let value = sample_value(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &value, |b, value| {
            b.iter(|| black_box(encode(value, Vec::new())));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for &size in &[8usize, 64, 512] {
        let bytes = encode(&sample_value(size), Vec::new());
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let mut decoder = Decoder::new(bytes.clone());
                black_box(decoder.decode().unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
