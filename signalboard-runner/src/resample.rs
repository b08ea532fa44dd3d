//! Time-bucket resampling of bar series.
//!
//! Buckets are labelled by their start. Intraday buckets are floored from
//! midnight plus an optional offset in minutes: with no offset a 30m bucket
//! holding 09:15 starts at 09:00, with the 15 minute session offset it
//! starts at 09:15 and hourly candles run 09:15-10:14. Daily buckets start
//! at the calendar date, weekly on Monday and monthly on the 1st; the offset
//! does not apply to them.
//! Open is the first open, high the max, low the min, close the last close
//! and volume the sum. Empty buckets produce no bar.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use signalboard_core::domain::{Bar, Timeframe};

/// Offset that aligns intraday candles with the 09:15 cash-market open.
pub const SESSION_OFFSET_MINUTES: u32 = 15;

/// Start of the bucket containing `ts`, intraday buckets anchored at midnight.
pub fn bucket_start(ts: NaiveDateTime, tf: Timeframe) -> NaiveDateTime {
    bucket_start_with_offset(ts, tf, 0)
}

/// Start of the bucket containing `ts`, intraday buckets anchored at
/// midnight + `offset_minutes`.
pub fn bucket_start_with_offset(ts: NaiveDateTime, tf: Timeframe, offset_minutes: u32) -> NaiveDateTime {
    let date = ts.date();
    let midnight = |d: NaiveDate| d.and_time(chrono::NaiveTime::MIN);
    match tf {
        Timeframe::M5 | Timeframe::M15 | Timeframe::M30 | Timeframe::M60 => {
            let step = i64::from(tf.minutes());
            let minute = i64::from(ts.hour() * 60 + ts.minute());
            let into_bucket = (minute - i64::from(offset_minutes)).rem_euclid(step);
            midnight(date) + Duration::minutes(minute - into_bucket)
        }
        Timeframe::Daily => midnight(date),
        Timeframe::Weekly => {
            midnight(date - Duration::days(i64::from(date.weekday().num_days_from_monday())))
        }
        Timeframe::Monthly => midnight(date.with_day(1).unwrap_or(date)),
    }
}

/// Resample a time-ordered series into `tf` buckets anchored at midnight.
pub fn resample(bars: &[Bar], tf: Timeframe) -> Vec<Bar> {
    resample_with_offset(bars, tf, 0)
}

/// Resample with intraday buckets anchored at midnight + `offset_minutes`.
pub fn resample_with_offset(bars: &[Bar], tf: Timeframe, offset_minutes: u32) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    for bar in bars.iter().filter(|b| !b.is_void()) {
        let start = bucket_start_with_offset(bar.timestamp, tf, offset_minutes);
        match out.last_mut() {
            Some(cur) if cur.timestamp == start => {
                cur.high = cur.high.max(bar.high);
                cur.low = cur.low.min(bar.low);
                cur.close = bar.close;
                cur.volume += bar.volume;
            }
            _ => out.push(Bar { timestamp: start, ..bar.clone() }),
        }
    }
    out
}
