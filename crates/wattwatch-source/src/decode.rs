//! Decoding samples from the realtime database's JSON
//!
//! A range query returns an object keyed by sample timestamp, or `null` when
//! nothing matched. Keys that are not integers are skipped; malformed readings
//! degrade to zero inside [`Sample::from_key_value`].

use serde_json::Value;
use tracing::debug;
use wattwatch_api::Sample;

use crate::{SourceError, SourceResult};

/// Decode a range query response into samples sorted by key
pub fn decode_samples(body: &Value) -> SourceResult<Vec<Sample>> {
    let map = match body {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(SourceError::Decode(format!(
                "expected an object of samples, got {}",
                json_kind(other)
            )));
        }
    };

    let mut samples: Vec<Sample> = map
        .iter()
        .filter_map(|(key, value)| {
            let sample = Sample::from_key_value(key, value);
            if sample.is_none() {
                debug!(key = %key, "Skipping sample with non-numeric key");
            }
            sample
        })
        .collect();

    // Object key order is not guaranteed to be numeric order
    samples.sort_by_key(|s| s.timestamp);
    Ok(samples)
}

/// Format a timestamp as a source key. Ten-digit second timestamps (2001
/// through 2286) sort the same as strings and as numbers.
pub fn format_key(ts: i64) -> String {
    ts.to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_body_is_empty() {
        assert!(decode_samples(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn samples_are_sorted_numerically() {
        let body = json!({
            "1750000120": {"load1": {"energy": 1.0}},
            "1750000000": {"load2": {"energy": "2.5"}},
            "not-a-key": {"load1": {"energy": 9.0}},
            "1750000060": {"load3": {"energy": null}},
        });

        let samples = decode_samples(&body).unwrap();
        let keys: Vec<i64> = samples.iter().map(|s| s.timestamp).collect();
        assert_eq!(keys, vec![1_750_000_000, 1_750_000_060, 1_750_000_120]);
        assert_eq!(samples[0].load2.unwrap().energy, 2.5);
        assert_eq!(samples[1].load3.unwrap().energy, 0.0);
    }

    #[test]
    fn array_body_is_rejected() {
        let err = decode_samples(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }
}
