use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use oracle_core::PriceFeedResult;
use oracle_price_feed::{mean_price, AggregatorConfig, PriceAggregator, PriceFetcher};

struct FixedFetcher {
    name: String,
    price: Decimal,
}

#[async_trait]
impl PriceFetcher for FixedFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_pair(&self, _base: &str, _quote: &str) {}

    async fn fetch_price(&self, _base: &str, _quote: &str) -> PriceFeedResult<Decimal> {
        Ok(self.price)
    }
}

fn fetchers(count: usize) -> Vec<Arc<dyn PriceFetcher>> {
    (0..count)
        .map(|i| {
            Arc::new(FixedFetcher {
                name: format!("exchange{}", i),
                price: Decimal::new(4_100 + i as i64, 2),
            }) as Arc<dyn PriceFetcher>
        })
        .collect()
}

fn bench_mean(c: &mut Criterion) {
    let prices: Vec<Decimal> = (0..9).map(|i| Decimal::new(4_100 + i, 2)).collect();
    c.bench_function("mean_price_9", |b| b.iter(|| mean_price(black_box(&prices))));
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("aggregate");
    for count in [3usize, 9] {
        let config = AggregatorConfig {
            min_results_num: 2,
            fetch_timeout: Duration::from_secs(1),
        };
        let aggregator = PriceAggregator::new(config, fetchers(count)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &aggregator, |b, agg| {
            b.to_async(&rt)
                .iter(|| async { agg.fetch_price("EGLD", "USD").await.unwrap() })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_mean, bench_fan_out);
criterion_main!(benches);
