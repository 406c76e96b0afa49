use chrono::{Duration, TimeZone, Utc};
use common::{Bar, BarSeries};
use proptest::prelude::*;

fn bar(minute: i64, close: f64) -> Bar {
    let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute);
    Bar::new(ts, close, close, close, close, 1.0)
}

proptest! {
    /// Merged series are strictly increasing and the later batch wins on overlap.
    #[test]
    fn merge_is_ordered_and_fine_wins(
        coarse in prop::collection::vec((0i64..500, 1.0f64..2.0), 1..60),
        fine in prop::collection::vec((0i64..500, 10.0f64..20.0), 0..60),
    ) {
        let coarse_bars: Vec<Bar> = coarse.iter().map(|&(m, c)| bar(m, c)).collect();
        let fine_bars: Vec<Bar> = fine.iter().map(|&(m, c)| bar(m, c)).collect();

        let series = BarSeries::merge("XAUUSD", [coarse_bars.clone(), fine_bars.clone()]);

        prop_assert!(series.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));

        for fb in &fine_bars {
            // Last occurrence inside the fine batch is the one expected to survive.
            let expected = fine_bars.iter().rev().find(|b| b.timestamp == fb.timestamp).unwrap();
            prop_assert_eq!(series.get(fb.timestamp).map(|b| b.close), Some(expected.close));
        }

        for cb in &coarse_bars {
            prop_assert!(series.get(cb.timestamp).is_some());
        }
    }
}
