use aqi_forecast::aggregation::DailyAggregator;
use aqi_forecast::aqi::AqiScorer;
use aqi_forecast::config::AggregationConfig;
use aqi_forecast::frame::{Resolution, TimeSeriesFrame};
use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;

fn create_hourly_frame(n_days: usize) -> TimeSeriesFrame {
    let mut rng = StdRng::seed_from_u64(0);
    let n = n_days * 24;
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let index = (0..n).map(|h| start + Duration::hours(h as i64)).collect();

    let mut series = |scale: f64| -> Vec<f64> {
        (0..n)
            .map(|_| if rng.gen::<f64>() < 0.05 { f64::NAN } else { rng.gen::<f64>() * scale })
            .collect()
    };
    let no2 = series(120.0);
    let pm10 = series(60.0);
    let pm25 = series(40.0);

    TimeSeriesFrame::new("Date_Time", Resolution::SubDaily, index)
        .unwrap()
        .with_numeric("NO2", no2)
        .unwrap()
        .with_numeric("PM10", pm10)
        .unwrap()
        .with_numeric("PM25", pm25)
        .unwrap()
}

fn bench_scoring(c: &mut Criterion) {
    let scorer = AqiScorer::new();
    let mut rng = StdRng::seed_from_u64(1);
    let days: Vec<(f64, f64, f64)> = (0..10_000)
        .map(|_| (rng.gen::<f64>() * 450.0, rng.gen::<f64>() * 120.0, rng.gen::<f64>() * 70.0))
        .collect();

    c.bench_function("score_10k_days", |b| {
        b.iter(|| {
            days.iter()
                .filter_map(|&(no2, pm10, pm25)| scorer.score(black_box(no2), pm10, pm25))
                .count()
        })
    });
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("daily_aggregation");
    let aggregator = DailyAggregator::new(AggregationConfig::default());

    for n_days in [30, 365].iter() {
        let frame = create_hourly_frame(*n_days);
        group.bench_with_input(BenchmarkId::new("aggregate", n_days), &frame, |b, frame| {
            b.iter(|| aggregator.aggregate(black_box(frame)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("aggregate_and_score", n_days), &frame, |b, frame| {
            b.iter(|| {
                let daily = aggregator.aggregate(black_box(frame)).unwrap();
                AqiScorer::new().score_frame(&daily).unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scoring, bench_aggregation);
criterion_main!(benches);
