use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use orchestrator::{Offer, OfferItem, offers_from_catalog, select_best};
use serde_json::{Value, json};

fn make_offers(count: usize) -> Vec<Offer> {
    (0..count)
        .map(|i| {
            Offer::new(
                format!("der-{i}"),
                vec![OfferItem {
                    id: format!("item-{i}"),
                    price: 200.0 + (i % 37) as f64 * 25.0,
                    capacity: 10.0 + (i % 13) as f64 * 10.0,
                }],
            )
        })
        .collect()
}

fn make_catalog(count: usize) -> Value {
    let providers: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "id": format!("der-{i}"),
                "items": [{
                    "id": format!("item-{i}"),
                    "price": { "value": format!("{}", 200 + (i % 37) * 25) },
                    "quantity": { "available": { "count": 10 + (i % 13) * 10 } }
                }]
            })
        })
        .collect();
    json!({ "message": { "catalog": { "providers": providers } } })
}

fn bench_select_best(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector/select_best");
    for count in [10, 100, 1000] {
        let offers = make_offers(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &offers, |b, offers| {
            b.iter(|| select_best(offers).unwrap());
        });
    }
    group.finish();
}

fn bench_catalog_extraction(c: &mut Criterion) {
    let catalog = make_catalog(100);

    c.bench_function("selector/extract_and_select_100", |b| {
        b.iter(|| {
            let offers = offers_from_catalog(&catalog);
            select_best(&offers).unwrap();
        });
    });
}

criterion_group!(benches, bench_select_best, bench_catalog_extraction);
criterion_main!(benches);
