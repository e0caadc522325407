use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SkqError, SkqResult};

pub(crate) const DEFAULT_MAX_RETRIES: u32 = 25;

/// One Sidekiq job envelope. Field names follow the wire format so Ruby-side
/// enqueuers and dashboards interoperate unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub class: String,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Optional on the wire; always set after fetch from the list key the
    /// envelope came out of.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub queue: String,
    #[serde(default)]
    pub jid: String,

    /// `false` (no retry), `true` (default cap) or a non-negative number
    /// (explicit cap). Kept verbatim so a rewrite round-trips the original
    /// value; the rest of the crate only reads `max_retries`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub retry: Value,

    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_class: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub retried_at: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failed_at: String,

    #[serde(skip)]
    pub max_retries: u32,
}

impl Job {
    pub fn from_json(data: &[u8]) -> SkqResult<Job> {
        let mut job: Job = serde_json::from_slice(data).map_err(SkqError::MalformedJob)?;
        job.max_retries = normalize_retry(&job.retry);
        Ok(job)
    }

    pub fn to_json(&self) -> SkqResult<String> {
        serde_json::to_string(self).map_err(SkqError::SerializeJob)
    }
}

/// Collapse the polymorphic `retry` field into a single cap.
fn normalize_retry(retry: &Value) -> u32 {
    match retry {
        Value::Number(n) => match n.as_f64() {
            Some(max) if max >= 0.0 => max.floor() as u32,
            _ => 0,
        },
        Value::Bool(false) => 0,
        // true, absent, or anything else the wire hands us
        _ => DEFAULT_MAX_RETRIES,
    }
}

/// Value of the `worker:<id>` heartbeat key while a job is being processed.
#[derive(Serialize)]
pub(crate) struct RunningJob<'a> {
    pub(crate) queue: &'a str,
    pub(crate) payload: &'a Job,
    pub(crate) run_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Job {
        Job::from_json(raw.as_bytes()).unwrap()
    }

    #[test]
    fn retry_normalization() {
        let cases = [
            (r#"{"class":"A","jid":"1","retry":true}"#, DEFAULT_MAX_RETRIES),
            (r#"{"class":"A","jid":"1","retry":false}"#, 0),
            (r#"{"class":"A","jid":"1","retry":7}"#, 7),
            (r#"{"class":"A","jid":"1","retry":7.9}"#, 7),
            (r#"{"class":"A","jid":"1"}"#, DEFAULT_MAX_RETRIES),
            (r#"{"class":"A","jid":"1","retry":null}"#, DEFAULT_MAX_RETRIES),
            (r#"{"class":"A","jid":"1","retry":"nope"}"#, DEFAULT_MAX_RETRIES),
            (r#"{"class":"A","jid":"1","retry":-3}"#, 0),
        ];
        for (raw, expected) in cases {
            assert_eq!(parse(raw).max_retries, expected, "for {raw}");
        }
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let err = Job::from_json(b"{not json").unwrap_err();
        assert!(matches!(err, SkqError::MalformedJob(_)));
    }

    #[test]
    fn round_trip_preserves_persisted_fields() {
        let raw = r#"{"class":"HardWorker","args":[1,"two",{"x":3}],"queue":"critical","jid":"abc123","retry":5,"retry_count":2,"error_message":"boom","error_class":"RuntimeError","retried_at":"2024-01-01 00:00:00 UTC","failed_at":"2023-12-31 00:00:00 UTC"}"#;
        let job = parse(raw);
        let rewritten = parse(&job.to_json().unwrap());
        assert_eq!(job, rewritten);
    }

    #[test]
    fn integer_retry_survives_rewrite_as_integer() {
        let job = parse(r#"{"class":"A","jid":"1","retry":5}"#);
        let out = job.to_json().unwrap();
        assert!(out.contains(r#""retry":5"#), "got {out}");
        assert!(!out.contains("5.0"));
    }

    #[test]
    fn boolean_retry_survives_rewrite() {
        let job = parse(r#"{"class":"A","jid":"1","retry":true}"#);
        assert!(job.to_json().unwrap().contains(r#""retry":true"#));
    }

    #[test]
    fn absent_fields_stay_absent() {
        let job = parse(r#"{"class":"A","jid":"1"}"#);
        let out = job.to_json().unwrap();
        assert!(!out.contains(r#""queue":"#));
        assert!(!out.contains(r#""retry":"#));
        assert!(!out.contains(r#""failed_at":"#));
        // retry_count is always on the wire, like the Ruby side writes it
        assert!(out.contains(r#""retry_count":0"#));
    }

    #[test]
    fn running_job_payload_shape() {
        let job = parse(r#"{"class":"A","args":[1],"jid":"1"}"#);
        let running = RunningJob {
            queue: "default",
            payload: &job,
            run_at: 1700000000,
        };
        let out = serde_json::to_string(&running).unwrap();
        assert!(out.contains(r#""queue":"default""#));
        assert!(out.contains(r#""payload":{"#));
        assert!(out.contains(r#""run_at":1700000000"#));
    }
}
