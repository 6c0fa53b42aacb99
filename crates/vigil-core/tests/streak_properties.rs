//! Property tests for the streak engine.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use vigil_core::{CheckInHistory, StreakEngine, NEVER_CHECKED_IN};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 15, 45, 0).unwrap()
}

/// Distinct past day offsets (0 = today) with a random time of day each.
fn history_strategy() -> impl Strategy<Value = (BTreeSet<i64>, Vec<DateTime<Utc>>)> {
    prop::collection::btree_set(0i64..40, 0..20).prop_flat_map(|days| {
        let n = days.len();
        (Just(days), prop::collection::vec(0i64..86_400, n))
    })
    .prop_map(|(days, secs)| {
        let midnight = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let instants = days
            .iter()
            .zip(secs)
            .map(|(d, s)| midnight - Duration::days(*d) + Duration::seconds(s))
            .collect();
        (days, instants)
    })
}

/// Reference streak: walk back from today (or yesterday) over the day set.
fn expected_streak(days: &BTreeSet<i64>) -> u32 {
    let start = if days.contains(&0) {
        0
    } else if days.contains(&1) {
        1
    } else {
        return 0;
    };
    (start..).take_while(|d| days.contains(d)).count() as u32
}

proptest! {
    #[test]
    fn checked_in_today_iff_zero_days_missed((_, instants) in history_strategy()) {
        let engine = StreakEngine::utc();
        let history = CheckInHistory::from_instants(instants);
        prop_assert_eq!(
            engine.is_checked_in_today(&history, now()),
            engine.days_missed(&history, now()) == 0
        );
    }

    #[test]
    fn days_missed_is_offset_of_latest_day((days, instants) in history_strategy()) {
        let engine = StreakEngine::utc();
        let history = CheckInHistory::from_instants(instants);
        let expected = days.iter().next().map(|d| *d as u32).unwrap_or(NEVER_CHECKED_IN);
        prop_assert_eq!(engine.days_missed(&history, now()), expected);
    }

    #[test]
    fn streak_matches_reference((days, instants) in history_strategy()) {
        let engine = StreakEngine::utc();
        let history = CheckInHistory::from_instants(instants);
        prop_assert_eq!(engine.consecutive_days(&history, now()), expected_streak(&days));
    }

    #[test]
    fn duplicates_never_change_streak((_, instants) in history_strategy(), extra in 0i64..3600) {
        let engine = StreakEngine::utc();
        let base = CheckInHistory::from_instants(instants.clone());
        let doubled = CheckInHistory::from_instants(
            instants
                .iter()
                .copied()
                .chain(instants.iter().map(|i| {
                    // Nudge toward midnight so the duplicate stays on the same day.
                    let secs_into_day = i64::from(i.time().num_seconds_from_midnight());
                    *i - Duration::seconds(extra.min(secs_into_day))
                })),
        );
        prop_assert_eq!(
            engine.consecutive_days(&base, now()),
            engine.consecutive_days(&doubled, now())
        );
    }

    #[test]
    fn two_missed_days_reset_streak((_, instants) in history_strategy()) {
        let engine = StreakEngine::utc();
        let history = CheckInHistory::from_instants(instants);
        if engine.days_missed(&history, now()) >= 2 {
            prop_assert_eq!(engine.consecutive_days(&history, now()), 0);
        }
    }
}
