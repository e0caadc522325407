use time::OffsetDateTime;

/// Seconds since the epoch with sub-second precision, the score format the
/// `retry` and `schedule` sorted sets use on the wire.
pub(crate) fn epoch_seconds() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

/// Wall-clock timestamp in the format Sidekiq writes into `failed_at`,
/// `retried_at` and the per-worker `started` keys.
pub(crate) fn wall_timestamp(t: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

pub(crate) fn now_timestamp() -> String {
    wall_timestamp(OffsetDateTime::now_utc())
}

/// Timestamp for the `worker:<id>:started` key. Distinct from
/// `wall_timestamp`: nanosecond precision, trailing zeros trimmed, explicit
/// zone offset.
pub(crate) fn started_timestamp(t: OffsetDateTime) -> String {
    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    );
    if t.nanosecond() > 0 {
        let frac = format!("{:09}", t.nanosecond());
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out.push_str(" +0000 UTC");
    out
}

pub(crate) fn now_started_timestamp() -> String {
    started_timestamp(OffsetDateTime::now_utc())
}

/// Hostname and pid, captured once at startup and reused for every worker id.
pub(crate) fn process_identity() -> (String, u32) {
    let hostname = gethostname::gethostname().to_string_lossy().into_owned();
    (hostname, std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_timestamp_matches_sidekiq_format() {
        let t = OffsetDateTime::from_unix_timestamp(0).unwrap();
        assert_eq!(wall_timestamp(t), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn started_timestamp_has_nanos_and_offset() {
        let t = OffsetDateTime::from_unix_timestamp_nanos(123_456_789).unwrap();
        assert_eq!(started_timestamp(t), "1970-01-01 00:00:00.123456789 +0000 UTC");

        // trailing zeros trimmed
        let t = OffsetDateTime::from_unix_timestamp_nanos(500_000_000).unwrap();
        assert_eq!(started_timestamp(t), "1970-01-01 00:00:00.5 +0000 UTC");

        // no fractional part on whole seconds
        let t = OffsetDateTime::from_unix_timestamp(1).unwrap();
        assert_eq!(started_timestamp(t), "1970-01-01 00:00:01 +0000 UTC");
    }

    #[test]
    fn epoch_seconds_is_recent() {
        assert!(epoch_seconds() > 1.7e9);
    }

    #[test]
    fn process_identity_is_stable() {
        let (host, pid) = process_identity();
        assert!(!host.is_empty());
        assert_eq!(pid, std::process::id());
    }
}
