//! GPS time helpers.
//!
//! GPS time counts SI seconds since 1980-01-06T00:00:00Z without leap seconds,
//! so converting to UTC subtracts every leap second inserted since the epoch.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// UTC dates (00:00:00) at which a leap second had just been inserted.
const LEAP_SECONDS: [(i32, u32, u32); 18] = [
    (1981, 7, 1),
    (1982, 7, 1),
    (1983, 7, 1),
    (1985, 7, 1),
    (1988, 1, 1),
    (1990, 1, 1),
    (1991, 1, 1),
    (1992, 7, 1),
    (1993, 7, 1),
    (1994, 7, 1),
    (1996, 1, 1),
    (1997, 7, 1),
    (1999, 1, 1),
    (2006, 1, 1),
    (2009, 1, 1),
    (2012, 7, 1),
    (2015, 7, 1),
    (2017, 1, 1),
];

fn gps_epoch() -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(1980, 1, 6, 0, 0, 0).single()
}

/// Convert a GPS timestamp to UTC. Returns `None` for non-finite or pre-epoch input.
pub fn gps_to_utc(gps: f64) -> Option<DateTime<Utc>> {
    if !gps.is_finite() || gps < 0.0 {
        return None;
    }
    let epoch = gps_epoch()?;
    let whole = gps.floor();
    let nanos = ((gps - whole) * 1e9).round() as i64;
    let whole = whole as i64;

    let mut leaps = 0_i64;
    for &(y, m, d) in &LEAP_SECONDS {
        let inserted = Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single()?;
        if epoch + Duration::seconds(whole - leaps - 1) >= inserted {
            leaps += 1;
        } else {
            break;
        }
    }

    Some(epoch + Duration::seconds(whole - leaps) + Duration::nanoseconds(nanos))
}

/// Human-readable UTC string (`2015-09-14 09:50:45.400 UTC`), or `-`.
pub fn format_utc(gps: f64) -> String {
    gps_to_utc(gps)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gw150914_trigger_time() {
        // 17 leap seconds had accumulated by September 2015.
        assert_eq!(format_utc(1126259462.4), "2015-09-14 09:50:45.400 UTC");
    }

    #[test]
    fn gw170817_trigger_time() {
        // After the 2017-01-01 leap second the offset is 18 s.
        assert_eq!(format_utc(1187008882.4), "2017-08-17 12:41:04.400 UTC");
    }

    #[test]
    fn rejects_invalid_input() {
        assert!(gps_to_utc(f64::NAN).is_none());
        assert!(gps_to_utc(-1.0).is_none());
        assert_eq!(format_utc(f64::INFINITY), "-");
    }
}
