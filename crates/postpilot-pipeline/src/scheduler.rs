//! Slot scheduler
//!
//! Greedy, unidirectional search for the next free publication slot. A slot
//! is a (calendar day, time-of-day) pair; only exact-key collisions count.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

pub type SlotKey = (NaiveDate, NaiveTime);

/// Reduce already-scheduled publish times to slot keys.
pub fn occupied_slots<'a, I>(scheduled: I) -> HashSet<SlotKey>
where
    I: IntoIterator<Item = &'a DateTime<Utc>>,
{
    scheduled
        .into_iter()
        .map(|at| (at.date_naive(), at.time()))
        .collect()
}

/// Walk forward day by day from `now`, trying each preferred time in order;
/// return the first strictly-future, unoccupied slot. When the look-ahead
/// window is exhausted, fall back to tomorrow at the first preferred time;
/// the fallback is best-effort and may collide with an existing post.
pub fn next_available_slot(
    now: DateTime<Utc>,
    preferred_times: &[NaiveTime],
    occupied: &HashSet<SlotKey>,
    lookahead_days: i64,
) -> DateTime<Utc> {
    let first_time = preferred_times
        .first()
        .copied()
        .unwrap_or_else(|| NaiveTime::from_hms_opt(9, 0, 0).expect("valid constant time"));

    for day_offset in 0..lookahead_days.max(1) {
        let date = (now + Duration::days(day_offset)).date_naive();
        for &time in preferred_times {
            let candidate = date.and_time(time).and_utc();
            if candidate > now && !occupied.contains(&(date, time)) {
                return candidate;
            }
        }
    }

    let fallback_date = (now + Duration::days(1)).date_naive();
    fallback_date.and_time(first_time).and_utc()
}
