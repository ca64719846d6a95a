use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::api::ValidationError;

pub type Payload = Map<String, Value>;

pub const EVENT_TYPE_KEY: &str = "event-type";
pub const TRACE_TIMESTAMP_KEY: &str = "x-vf-trace-timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Client,
    Internal,
    Request,
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(EventType::Client),
            "internal" => Ok(EventType::Internal),
            "request" => Ok(EventType::Request),
            _ => Err(()),
        }
    }
}

/// Declares that identical business events sharing `key` must not be sent
/// more than once every `repeat_seconds`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Duplication {
    pub key: String,
    #[serde(rename = "repeatSeconds", deserialize_with = "whole_seconds")]
    pub repeat_seconds: u64,
}

/// `repeatSeconds` may be fractional. A started second counts as a whole cache tick, and
/// anything that is not a positive number never throttles.
fn whole_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    if seconds.is_finite() && seconds > 0.0 {
        Ok(seconds.ceil() as u64)
    } else {
        Ok(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplication: Option<Duplication>,
}

impl Event {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload: Some(Value::Object(payload)),
            duplication: None,
        }
    }

    pub fn with_duplication(mut self, key: impl Into<String>, repeat_seconds: u64) -> Self {
        self.duplication = Some(Duplication {
            key: key.into(),
            repeat_seconds,
        });
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let payload = match &self.payload {
            Some(Value::Object(payload)) => payload,
            _ => return Err(ValidationError::MissingPayload(self.to_string())),
        };

        match payload.get(EVENT_TYPE_KEY) {
            None => Err(ValidationError::MissingEventType(self.to_string())),
            Some(value) => match value.as_str().map(EventType::from_str) {
                Some(Ok(_)) => Ok(()),
                _ => Err(ValidationError::InvalidEventType(self.to_string())),
            },
        }
    }

    /// Consumes a validated event. Anything that is not an object yields an empty payload,
    /// which `validate` would have rejected.
    pub fn into_payload(self) -> Payload {
        match self.payload {
            Some(Value::Object(payload)) => payload,
            _ => Payload::new(),
        }
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

/// All-or-nothing: the first invalid event fails the whole batch.
pub fn validate_events(events: &[Event]) -> Result<(), ValidationError> {
    events.iter().try_for_each(Event::validate)
}

/// Stamps every payload with the same capture instant. Values already present are kept.
pub fn add_timestamp(payloads: &mut [Payload], timestamp: &str) {
    for payload in payloads.iter_mut() {
        payload
            .entry(TRACE_TIMESTAMP_KEY)
            .or_insert_with(|| Value::String(timestamp.to_owned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(payload: Value) -> Event {
        Event {
            payload: Some(payload),
            duplication: None,
        }
    }

    #[test]
    fn accepts_known_event_types() {
        for event_type in ["client", "internal", "request"] {
            assert_eq!(event(json!({ "event-type": event_type })).validate(), Ok(()));
        }
    }

    #[test]
    fn rejects_missing_or_non_object_payload() {
        let missing = Event::default();
        assert!(matches!(
            missing.validate(),
            Err(ValidationError::MissingPayload(_))
        ));

        let scalar = event(json!("client"));
        assert!(matches!(
            scalar.validate(),
            Err(ValidationError::MissingPayload(_))
        ));

        let array = event(json!([{ "event-type": "client" }]));
        assert!(matches!(
            array.validate(),
            Err(ValidationError::MissingPayload(_))
        ));
    }

    #[test]
    fn rejects_missing_event_type() {
        let err = event(json!({})).validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingEventType(r#"{"payload":{}}"#.to_string())
        );
    }

    #[test]
    fn rejects_unknown_or_non_string_event_type() {
        for value in [json!("bogus"), json!("Client"), json!(1), json!(null)] {
            let err = event(json!({ "event-type": value })).validate().unwrap_err();
            assert!(matches!(err, ValidationError::InvalidEventType(_)), "{err}");
        }
    }

    #[test]
    fn first_invalid_event_fails_the_batch() {
        let events = vec![
            event(json!({ "event-type": "client" })),
            event(json!({ "event-type": "bogus" })),
            event(json!({})),
        ];

        assert!(matches!(
            validate_events(&events),
            Err(ValidationError::InvalidEventType(_))
        ));
    }

    #[test]
    fn deserializes_duplication_descriptor() {
        let parsed: Event = serde_json::from_str(
            r#"{"payload":{"event-type":"client"},"duplication":{"key":"login","repeatSeconds":30}}"#,
        )
        .unwrap();

        assert_eq!(
            parsed.duplication,
            Some(Duplication {
                key: "login".to_string(),
                repeat_seconds: 30
            })
        );
    }

    #[test]
    fn fractional_repeat_rounds_up_to_whole_ticks() {
        let repeat = |json: &str| {
            let duplication: Duplication = serde_json::from_str(json).unwrap();
            duplication.repeat_seconds
        };

        assert_eq!(repeat(r#"{"key":"k","repeatSeconds":1.5}"#), 2);
        assert_eq!(repeat(r#"{"key":"k","repeatSeconds":0.1}"#), 1);
        assert_eq!(repeat(r#"{"key":"k","repeatSeconds":30}"#), 30);
        assert_eq!(repeat(r#"{"key":"k","repeatSeconds":-4}"#), 0);
        assert!(serde_json::from_str::<Duplication>(r#"{"key":"k","repeatSeconds":"30"}"#).is_err());
    }

    #[test]
    fn timestamp_is_shared_and_does_not_overwrite() {
        let mut payloads = vec![
            json!({ "event-type": "client" }).as_object().unwrap().clone(),
            json!({ "event-type": "client", TRACE_TIMESTAMP_KEY: "earlier" })
                .as_object()
                .unwrap()
                .clone(),
        ];

        add_timestamp(&mut payloads, "2024-01-01T00:00:00.000Z");

        assert_eq!(payloads[0][TRACE_TIMESTAMP_KEY], "2024-01-01T00:00:00.000Z");
        assert_eq!(payloads[1][TRACE_TIMESTAMP_KEY], "earlier");
    }
}
