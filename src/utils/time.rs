use chrono::{DateTime, Utc};
use std::time::Duration;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Wall-clock age of `since` at `now`; zero when `since` lies in the future.
pub fn age(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}
