//! Event search inside a bounded time window.
//!
//! The window is scanned at a fixed step; every sign change of the target
//! function is then narrowed by bisection.

use chrono::{DateTime, Duration, Utc};

/// Scan step; short enough that no body rises and sets within one step
pub const SCAN_STEP_MINUTES: i64 = 10;

/// Bisection stops once the bracket is this narrow
const PRECISION_MS: i64 = 500;

/// First upward and downward crossings of zero in `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Crossings {
    pub rising: Option<DateTime<Utc>>,
    pub setting: Option<DateTime<Utc>>,
}

/// Find where `f` crosses zero going up (rising) and going down (setting).
///
/// Both fields stay `None` when `f` keeps one sign over the whole window,
/// i.e. the body is always up or never up.
pub fn find_crossings<F>(start: DateTime<Utc>, end: DateTime<Utc>, f: F) -> Crossings
where
    F: Fn(DateTime<Utc>) -> f64,
{
    let step = Duration::minutes(SCAN_STEP_MINUTES);
    let mut crossings = Crossings::default();

    let mut t = start;
    let mut value = f(t);
    while t < end && (crossings.rising.is_none() || crossings.setting.is_none()) {
        let next = (t + step).min(end);
        let next_value = f(next);

        if value < 0.0 && next_value >= 0.0 && crossings.rising.is_none() {
            let at = bisect(t, next, &f, true);
            if at < end {
                crossings.rising = Some(at);
            }
        } else if value >= 0.0 && next_value < 0.0 && crossings.setting.is_none() {
            let at = bisect(t, next, &f, false);
            if at < end {
                crossings.setting = Some(at);
            }
        }

        t = next;
        value = next_value;
    }

    crossings
}

/// First time in `[start, end)` where the wrapped angle `f` passes through
/// zero from below; wrap-around jumps of the angle are not crossings.
pub fn find_transit<F>(start: DateTime<Utc>, end: DateTime<Utc>, f: F) -> Option<DateTime<Utc>>
where
    F: Fn(DateTime<Utc>) -> f64,
{
    let step = Duration::minutes(SCAN_STEP_MINUTES);
    let mut t = start;
    let mut value = f(t);
    while t < end {
        let next = (t + step).min(end);
        let next_value = f(next);
        let continuous = (next_value - value).abs() < std::f64::consts::PI;
        if continuous && value < 0.0 && next_value >= 0.0 {
            let at = bisect(t, next, &f, true);
            return (at < end).then_some(at);
        }
        t = next;
        value = next_value;
    }
    None
}

/// Narrow `[lo, hi]` around the sign change; returns the earliest time at
/// which the function is on the far side of zero.
fn bisect<F>(mut lo: DateTime<Utc>, mut hi: DateTime<Utc>, f: &F, rising: bool) -> DateTime<Utc>
where
    F: Fn(DateTime<Utc>) -> f64,
{
    while (hi - lo).num_milliseconds() > PRECISION_MS {
        let mid = lo + (hi - lo) / 2;
        let crossed = if rising { f(mid) >= 0.0 } else { f(mid) < 0.0 };
        if crossed {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}
