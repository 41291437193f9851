mod common;

use common::{FakeListing, Scenario, SubListing, fast_config, init_test_tracing};
use lingua_common::HarvestError;
use lingua_harvest::paginate::walk_pages;
use lingua_harvest::PageWalk;

fn selected(sub: SubListing) -> FakeListing {
    let fake = FakeListing::new(Scenario {
        categories: vec![vec![sub]],
        ..Scenario::default()
    });
    fake.select(0, 0);
    fake
}

#[tokio::test]
async fn halts_after_exactly_n_loads_once_the_sentinel_shows() {
    init_test_tracing();
    let config = fast_config();

    for n in 1..=4u32 {
        let fake = selected(SubListing::new(3, n + 1));
        let walk = walk_pages(&fake, fake.listing(), &config.pagination)
            .await
            .unwrap();

        assert_eq!(walk, PageWalk::LastPage { pages: n });
        assert_eq!(fake.counters().load_more_clicks, n);
    }
}

#[tokio::test]
async fn vanished_control_keeps_the_loaded_batch() {
    let config = fast_config();
    let fake = selected(SubListing::new(2, 3).without_sentinel());

    let walk = walk_pages(&fake, fake.listing(), &config.pagination)
        .await
        .unwrap();

    match &walk {
        PageWalk::ControlFailed { pages, error } => {
            assert_eq!(*pages, 2);
            assert!(matches!(error, HarvestError::NotFound(_)));
        }
        other => panic!("unexpected walk: {other:?}"),
    }
    assert!(walk.has_batch());
    assert_eq!(fake.counters().load_more_clicks, 2);
}

#[tokio::test]
async fn empty_selection_never_clicks() {
    let config = fast_config();
    let fake = selected(SubListing::empty());

    let walk = walk_pages(&fake, fake.listing(), &config.pagination)
        .await
        .unwrap();

    assert_eq!(walk, PageWalk::NoResults { pages: 0 });
    assert!(!walk.has_batch());
    assert_eq!(fake.counters().load_more_clicks, 0);
}

#[tokio::test]
async fn stops_at_the_page_limit() {
    let mut config = fast_config();
    config.pagination.max_pages = 2;
    let fake = selected(SubListing::new(1, 10));

    let walk = walk_pages(&fake, fake.listing(), &config.pagination)
        .await
        .unwrap();

    assert_eq!(walk, PageWalk::PageLimit { pages: 2 });
    assert_eq!(fake.counters().load_more_clicks, 2);
}
