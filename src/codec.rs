// codec.rs
// Inbound frames carry `{"data": {"hoistTime": [entry, ...]}}` where an entry
// is either a `[ts, value]` pair or an object keyed by position
// (`{"0": ts, "1": value}`). Only the first entry of each series is read.
// A bad field is dropped on its own; only text that is not JSON is an error.

use crate::config::FeedConfig;
use crate::snapshot::{bindings_for, FieldValue, MetricKind};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed json frame: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// A scalar taken from the wire before it is coerced for a field.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Flag(bool),
}

impl RawValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(RawValue::Number),
            Value::String(s) => Some(RawValue::Text(s.clone())),
            Value::Bool(b) => Some(RawValue::Flag(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Wire key → latest value.
pub type Decoded = BTreeMap<String, RawValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerError {
    pub code: i64,
    pub message: Option<String>,
}

/// A decoded frame together with the envelope fields around `data`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryFrame {
    pub subscription_id: Option<i64>,
    pub error: Option<ServerError>,
    pub values: Decoded,
    /// Sample timestamps (ms) for the entries that carried one.
    pub timestamps: BTreeMap<String, i64>,
    /// Keys present under `data` whose entry could not be used.
    pub dropped: Vec<String>,
}

impl TelemetryFrame {
    /// True when the frame carried no telemetry at all, as opposed to
    /// telemetry that was entirely rejected.
    pub fn is_heartbeat(&self) -> bool {
        self.values.is_empty() && self.dropped.is_empty()
    }
}

pub fn decode(raw: &str) -> Result<Decoded, DecodeError> {
    decode_frame(raw).map(|frame| frame.values)
}

pub fn decode_frame(raw: &str) -> Result<TelemetryFrame, DecodeError> {
    let parsed: Value = serde_json::from_str(raw)?;
    let Value::Object(envelope) = parsed else {
        return Ok(TelemetryFrame::default());
    };

    let mut frame = TelemetryFrame {
        subscription_id: envelope.get("subscriptionId").and_then(Value::as_i64),
        error: server_error(&envelope),
        ..TelemetryFrame::default()
    };

    let Some(Value::Object(data)) = envelope.get("data") else {
        return Ok(frame);
    };

    for (key, series) in data {
        match latest_entry(series) {
            Some((ts, value)) if admits(key, &value) => {
                if let Some(ts) = ts {
                    frame.timestamps.insert(key.clone(), ts);
                }
                frame.values.insert(key.clone(), value);
            }
            _ => {
                trace!(metric = %key, "field dropped");
                frame.dropped.push(key.clone());
            }
        }
    }

    Ok(frame)
}

fn server_error(envelope: &Map<String, Value>) -> Option<ServerError> {
    let code = envelope
        .get("errorCode")
        .and_then(Value::as_i64)
        .filter(|code| *code != 0)?;
    let message = envelope
        .get("errorMsg")
        .and_then(Value::as_str)
        .map(str::to_owned);
    Some(ServerError { code, message })
}

fn latest_entry(series: &Value) -> Option<(Option<i64>, RawValue)> {
    let first = series.as_array()?.first()?;
    let (ts, value) = match first {
        Value::Object(entry) => (entry.get("0"), entry.get("1")?),
        Value::Array(pair) => (pair.first(), pair.get(1)?),
        _ => return None,
    };
    Some((ts.and_then(Value::as_i64), RawValue::from_json(value)?))
}

// A known key must coerce for every field it feeds; unknown keys pass through.
fn admits(key: &str, value: &RawValue) -> bool {
    bindings_for(key).all(|metric| coerce(value, metric.kind()).is_some())
}

/// Converts a raw value for a field of the given kind, or `None` when it does
/// not fit. Numbers are always finite.
pub fn coerce(value: &RawValue, kind: MetricKind) -> Option<FieldValue> {
    match kind {
        MetricKind::Number => parse_number(value).map(FieldValue::Number),
        MetricKind::Flag => parse_flag(value).map(FieldValue::Flag),
        MetricKind::Text => parse_text(value).map(FieldValue::Text),
    }
}

fn parse_number(value: &RawValue) -> Option<f64> {
    let n = match value {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
        RawValue::Flag(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_flag(value: &RawValue) -> Option<bool> {
    match value {
        RawValue::Flag(b) => Some(*b),
        RawValue::Text(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") {
                Some(false)
            } else {
                parse_number(value).map(|n| n != 0.0)
            }
        }
        RawValue::Number(_) => parse_number(value).map(|n| n != 0.0),
    }
}

fn parse_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Text(s) if s.trim().is_empty() => None,
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Number(n) if n.is_finite() => Some(n.to_string()),
        RawValue::Number(_) => None,
        RawValue::Flag(b) => Some(b.to_string()),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCmd {
    pub cmd_id: i64,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCmd {
    pub entity_type: String,
    pub entity_id: String,
    pub scope: String,
    pub cmd_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The single frame sent once the socket is open.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub auth_cmd: AuthCmd,
    pub cmds: Vec<SubscriptionCmd>,
}

impl SubscriptionRequest {
    pub fn for_feed(feed: &FeedConfig, token: &str) -> Self {
        Self {
            auth_cmd: AuthCmd {
                cmd_id: feed.auth_cmd_id,
                token: token.to_string(),
            },
            cmds: vec![SubscriptionCmd {
                entity_type: feed.entity_type.clone(),
                entity_id: feed.entity_id.clone(),
                scope: feed.scope.clone(),
                cmd_id: feed.subscription_cmd_id,
                kind: feed.subscription_type.clone(),
            }],
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_data_is_a_heartbeat() {
        assert!(decode(r#"{"subscriptionId":10}"#).unwrap().is_empty());
        assert!(decode(r#"{"data":{}}"#).unwrap().is_empty());
        assert!(decode("[1,2,3]").unwrap().is_empty());
        assert!(decode(r#"{"data":5}"#).unwrap().is_empty());
    }

    #[test]
    fn non_json_is_malformed() {
        let err = decode("definitely not json").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedJson(_)));
        assert!(decode("").is_err());
    }

    #[test]
    fn reads_object_and_pair_entries() {
        let decoded = decode(
            r#"{"data":{"hoistTime":[{"0":1700000000000,"1":"80"}],"trolleyTime":[[1700000000000,"12"]]}}"#,
        )
        .unwrap();
        assert_eq!(decoded["hoistTime"], RawValue::Text("80".into()));
        assert_eq!(decoded["trolleyTime"], RawValue::Text("12".into()));
    }

    #[test]
    fn only_first_entry_counts() {
        let decoded = decode(r#"{"data":{"hoistTime":[{"1":"80"},{"1":"70"}]}}"#).unwrap();
        assert_eq!(decoded["hoistTime"], RawValue::Text("80".into()));
    }

    #[test]
    fn entry_without_value_drops_only_that_metric() {
        let decoded = decode(
            r#"{"data":{"hoistTime":[{"0":17}],"trolleyTime":[{"1":"9"}],"alarmCount":[],"current":"7"}}"#,
        )
        .unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["trolleyTime"], RawValue::Text("9".into()));
    }

    #[test]
    fn unparseable_number_is_dropped() {
        let decoded =
            decode(r#"{"data":{"hoistTime":[{"1":"n/a"}],"hoistPulse":[{"1":"NaN"}],"trolleyPulse":[{"1":""}],"hoistOverload":[{"1":61}]}}"#)
                .unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded["hoistOverload"], RawValue::Number(61.0));
    }

    #[test]
    fn frame_lists_dropped_keys() {
        let frame = decode_frame(
            r#"{"data":{"hoistTime":[{"1":"n/a"}],"trolleyTime":[{"1":"9"}],"alarmCount":[]}}"#,
        )
        .unwrap();
        assert_eq!(frame.dropped, vec!["alarmCount".to_string(), "hoistTime".to_string()]);
        assert!(!frame.is_heartbeat());

        let empty = decode_frame(r#"{"data":{}}"#).unwrap();
        assert!(empty.dropped.is_empty());
        assert!(empty.is_heartbeat());
    }

    #[test]
    fn nested_and_null_values_are_dropped() {
        let decoded =
            decode(r#"{"data":{"hoistTime":[{"1":null}],"trolleyTime":[{"1":{"x":1}}]}}"#).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn unknown_keys_pass_through() {
        let decoded = decode(r#"{"data":{"craneTemperature":[{"1":"hot"}]}}"#).unwrap();
        assert_eq!(decoded["craneTemperature"], RawValue::Text("hot".into()));
    }

    #[test]
    fn frame_carries_envelope_metadata() {
        let frame = decode_frame(
            r#"{"subscriptionId":10,"errorCode":0,"errorMsg":null,"data":{"hoistTime":[[1700000000123,"80"]]}}"#,
        )
        .unwrap();
        assert_eq!(frame.subscription_id, Some(10));
        assert_eq!(frame.error, None);
        assert_eq!(frame.timestamps["hoistTime"], 1700000000123);
    }

    #[test]
    fn frame_reports_server_error() {
        let frame =
            decode_frame(r#"{"subscriptionId":10,"errorCode":2,"errorMsg":"Unauthorized"}"#).unwrap();
        assert_eq!(
            frame.error,
            Some(ServerError {
                code: 2,
                message: Some("Unauthorized".into())
            })
        );
        assert!(frame.values.is_empty());
    }

    #[test]
    fn decoding_is_deterministic() {
        let raw = r#"{"data":{"hoistTime":[{"1":"80"}],"antiSwayValue":[{"1":"OFF"}]}}"#;
        assert_eq!(decode(raw).unwrap(), decode(raw).unwrap());
    }

    #[test]
    fn number_coercion() {
        let num = |v: RawValue| coerce(&v, MetricKind::Number);
        assert_eq!(num(RawValue::Text(" 80 ".into())), Some(FieldValue::Number(80.0)));
        assert_eq!(num(RawValue::Text("1e3".into())), Some(FieldValue::Number(1000.0)));
        assert_eq!(num(RawValue::Text("inf".into())), None);
        assert_eq!(num(RawValue::Flag(true)), None);
    }

    #[test]
    fn flag_coercion() {
        let flag = |v: RawValue| coerce(&v, MetricKind::Flag);
        assert_eq!(flag(RawValue::Text("TRUE".into())), Some(FieldValue::Flag(true)));
        assert_eq!(flag(RawValue::Text("0".into())), Some(FieldValue::Flag(false)));
        assert_eq!(flag(RawValue::Number(1.0)), Some(FieldValue::Flag(true)));
        assert_eq!(flag(RawValue::Text("maybe".into())), None);
    }

    #[test]
    fn text_coercion() {
        let text = |v: RawValue| coerce(&v, MetricKind::Text);
        assert_eq!(text(RawValue::Text("OFF".into())), Some(FieldValue::Text("OFF".into())));
        assert_eq!(text(RawValue::Number(80.0)), Some(FieldValue::Text("80".into())));
        assert_eq!(text(RawValue::Text("  ".into())), None);
    }

    #[test]
    fn subscription_request_shape() {
        let feed = FeedConfig::default();
        let encoded = SubscriptionRequest::for_feed(&feed, "jwt").encode().unwrap();
        let value: Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value,
            json!({
                "authCmd": {"cmdId": 0, "token": "jwt"},
                "cmds": [{
                    "entityType": "DEVICE",
                    "entityId": feed.entity_id,
                    "scope": "LATEST_TELEMETRY",
                    "cmdId": 10,
                    "type": "TIMESERIES"
                }]
            })
        );
    }
}
