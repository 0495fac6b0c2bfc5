//! Integration tests for ny511-pipeline crate.
//!
//! These run the adapters against an in-memory SODA fixture that evaluates the
//! typed queries the pipeline issues.

use async_trait::async_trait;
use mockall::mock;
use ny511_common::test_utils::{day, init_test_logging, range, rows, FixtureSource};
use ny511_common::{CategoryCount, DailyCount, DatasetSource, Projection, Result, SoqlQuery};
use ny511_config::{Config, DailyStrategy};
use ny511_pipeline::{
    CategoryAdapter, DailyCountAdapter, Dashboard, DateRangeChanged, PageStrategy,
    RangeQueryBuilder,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Source {}

    #[async_trait]
    impl DatasetSource for Source {
        async fn fetch_rows(&self, query: &SoqlQuery) -> Result<Vec<Value>>;
    }
}

fn three_day_fixture() -> Arc<FixtureSource> {
    Arc::new(FixtureSource::new(vec![
        rows::event("A", "2020-01-01"),
        rows::event("A", "2020-01-02"),
        rows::event("B", "2020-01-03"),
    ]))
}

#[tokio::test]
async fn test_end_to_end_three_day_scenario() {
    init_test_logging();
    let source = three_day_fixture();
    let builder = RangeQueryBuilder::new(source);
    let range = range(day(2020, 1, 1), day(2020, 1, 3));

    let top = CategoryAdapter::new(builder.clone())
        .fetch_top_categories(&range, 5)
        .await
        .unwrap();
    assert_eq!(
        top,
        vec![
            CategoryCount { event_type: "A".to_string(), count: 2 },
            CategoryCount { event_type: "B".to_string(), count: 1 },
        ]
    );

    for strategy in [DailyStrategy::FromEvents, DailyStrategy::ServerSide] {
        let daily = DailyCountAdapter::new(builder.clone(), strategy)
            .fetch_daily_counts(&range)
            .await
            .unwrap();
        assert_eq!(
            daily,
            vec![
                DailyCount { day: day(2020, 1, 1), count: 1 },
                DailyCount { day: day(2020, 1, 2), count: 1 },
                DailyCount { day: day(2020, 1, 3), count: 1 },
            ],
            "strategy {strategy}"
        );
    }
}

#[tokio::test]
async fn test_page_order_independent_of_completion_order() {
    init_test_logging();
    let fixture = rows::many("A", "2020-01-01", 6);
    let source = Arc::new(
        FixtureSource::new(fixture)
            .with_page_delay(0, Duration::from_millis(120))
            .with_page_delay(2, Duration::from_millis(60)),
    );
    let builder = RangeQueryBuilder::new(source).with_strategy(PageStrategy::fixed(2, 3));

    let table = builder
        .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
        .await
        .unwrap();

    let facilities: Vec<&str> = table
        .iter()
        .map(|r| r.facility_name.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(
        facilities,
        vec!["segment-0", "segment-1", "segment-2", "segment-3", "segment-4", "segment-5"]
    );
}

#[tokio::test]
async fn test_full_first_page_still_requests_every_page() {
    let source = Arc::new(FixtureSource::new(rows::many("A", "2020-01-01", 1000)));
    let table = RangeQueryBuilder::new(source.clone())
        .fetch_events(&range(day(2020, 1, 1), day(2020, 1, 1)))
        .await
        .unwrap();

    assert_eq!(table.len(), 1000);
    assert_eq!(source.call_count(Projection::Events), 5);
}

#[tokio::test]
async fn test_single_day_boundary() {
    let source = Arc::new(FixtureSource::new(vec![
        rows::event("A", "2020-01-01"),
        rows::event("B", "2020-01-02"),
        rows::event("C", "2020-01-03"),
    ]));
    let table = RangeQueryBuilder::new(source)
        .fetch_events(&range(day(2020, 1, 2), day(2020, 1, 2)))
        .await
        .unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].event_type.as_deref(), Some("B"));
    assert_eq!(table.rows()[0].create_time, day(2020, 1, 2));
}

#[tokio::test]
async fn test_identical_fetches_are_idempotent() {
    let dashboard = Dashboard::new(RangeQueryBuilder::new(three_day_fixture()), DailyStrategy::FromEvents);
    let event = DateRangeChanged::new(day(2020, 1, 1), day(2020, 1, 3));

    let first = dashboard.on_range_changed(event).await.unwrap();
    let second = dashboard.on_range_changed(event).await.unwrap();

    assert_eq!(first.events.as_ref().unwrap(), second.events.as_ref().unwrap());
    assert_eq!(first.daily_counts.as_ref().unwrap(), second.daily_counts.as_ref().unwrap());
    assert_eq!(first.top_categories.as_ref().unwrap(), second.top_categories.as_ref().unwrap());
}

#[tokio::test]
async fn test_daily_counts_consistent_with_event_table() {
    let source = Arc::new(FixtureSource::new(
        [
            rows::many("A", "2020-02-01", 4),
            rows::many("B", "2020-02-03", 2),
            rows::many("C", "2020-02-07", 1),
        ]
        .concat(),
    ));
    let dashboard = Dashboard::new(RangeQueryBuilder::new(source), DailyStrategy::FromEvents);
    let update = dashboard
        .on_range_changed(DateRangeChanged::new(day(2020, 2, 1), day(2020, 2, 29)))
        .await
        .unwrap();

    let table = update.events.unwrap();
    let daily = update.daily_counts.unwrap();
    let total: u64 = daily.iter().map(|c| c.count).sum();
    assert_eq!(total, table.len() as u64);
    assert!(daily.windows(2).all(|w| w[0].day < w[1].day));

    let top = update.top_categories.unwrap();
    assert!(top.len() <= 5);
    assert!(top.windows(2).all(|w| w[0].count >= w[1].count));
}

#[tokio::test]
async fn test_reversed_range_issues_no_requests() {
    let mut source = MockSource::new();
    source.expect_fetch_rows().times(0);

    let dashboard = Dashboard::new(
        RangeQueryBuilder::new(Arc::new(source)),
        DailyStrategy::ServerSide,
    );
    let err = dashboard
        .on_range_changed(DateRangeChanged::new(day(2020, 4, 20), day(2020, 1, 20)))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_query_predicate_shared_by_adapters() {
    let mut source = MockSource::new();
    source
        .expect_fetch_rows()
        .withf(|query: &SoqlQuery| {
            query.filter().map(|f| f.to_soql())
                == Some(
                    "state = 'NY' AND date_trunc_ymd(create_time) between '2020-01-01' and '2020-01-03'"
                        .to_string(),
                )
        })
        .returning(|_| Ok(Vec::new()));

    let dashboard = Dashboard::from_config(Arc::new(source), &Config::default());
    let update = dashboard
        .on_range_changed(DateRangeChanged::new(day(2020, 1, 1), day(2020, 1, 3)))
        .await
        .unwrap();
    assert!(update.is_complete());
    assert!(update.events.unwrap().is_empty());
}
