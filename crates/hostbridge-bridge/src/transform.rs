//! Reply transforms applied per call site through [`crate::send_with`].
//!
//! A host replies with a plain list of values. What those values mean
//! belongs to the caller, so these helpers only cover the shapes that come
//! up over and over.

use serde::de::DeserializeOwned;

use hostbridge_codec::Value;

use crate::error::{BridgeError, Result};

/// The first value, or [`Value::Absent`] for an empty reply.
pub fn first(values: Vec<Value>) -> Result<Value> {
    Ok(values.into_iter().next().unwrap_or_default())
}

/// The first value, which must be text.
pub fn first_text(values: Vec<Value>) -> Result<String> {
    match values.into_iter().next() {
        Some(Value::Text(text)) => Ok(text),
        Some(other) => Err(BridgeError::Transform(format!(
            "expected text reply, got {}",
            other.tag().name()
        ))),
        None => Err(BridgeError::Transform("expected text reply, got nothing".into())),
    }
}

/// Parse the first value as JSON.
pub fn json<T: DeserializeOwned>(values: Vec<Value>) -> Result<T> {
    let text = first_text(values)?;
    serde_json::from_str(&text).map_err(|err| BridgeError::Transform(err.to_string()))
}

/// Pass the reply through unless the first value is a host error marker.
///
/// Hosts report failures as a JSON object with a truthy `Error` field and
/// the message under `Data` (e.g. `{"Error":true,"Data":"not a repository"}`).
pub fn check_error(values: Vec<Value>) -> Result<Vec<Value>> {
    if let Some(message) = values.first().and_then(error_marker) {
        return Err(BridgeError::Host(message));
    }
    Ok(values)
}

/// Discard the reply.
pub fn ignore(_values: Vec<Value>) -> Result<()> {
    Ok(())
}

fn error_marker(value: &Value) -> Option<String> {
    let text = value.as_str()?;
    let serde_json::Value::Object(object) = serde_json::from_str(text).ok()? else {
        return None;
    };
    let flag = object.get("Error").or_else(|| object.get("error"))?;
    let raised = match flag {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.is_empty(),
        _ => true,
    };
    if !raised {
        return None;
    }

    let message = match object.get("Data").or_else(|| object.get("data")) {
        Some(serde_json::Value::String(data)) => data.clone(),
        Some(data) => data.to_string(),
        None => match flag {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };
    Some(message)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[test]
    fn first_defaults_to_absent() {
        assert_eq!(first(Vec::new()).unwrap(), Value::Absent);
        assert_eq!(
            first(vec![Value::from(1), Value::from(2)]).unwrap(),
            Value::from(1)
        );
    }

    #[test]
    fn first_text_requires_text() {
        assert_eq!(first_text(vec![Value::from("x")]).unwrap(), "x");
        assert!(matches!(
            first_text(vec![Value::from(true)]),
            Err(BridgeError::Transform(msg)) if msg.contains("boolean")
        ));
        assert!(first_text(Vec::new()).is_err());
    }

    #[test]
    fn json_parses_first_value() {
        #[derive(Debug, Deserialize, PartialEq)]
        #[serde(rename_all = "PascalCase")]
        struct Head {
            name: String,
            hash: String,
        }

        let head: Head = json(vec![Value::from(r#"{"Name":"main","Hash":"abc"}"#)]).unwrap();
        assert_eq!(
            head,
            Head {
                name: "main".into(),
                hash: "abc".into()
            }
        );
        assert!(json::<Head>(vec![Value::from("not json")]).is_err());
    }

    #[test]
    fn check_error_detects_marker() {
        let err = check_error(vec![Value::from(r#"{"Error":true,"Data":"no remote"}"#)])
            .unwrap_err();
        assert!(matches!(err, BridgeError::Host(msg) if msg == "no remote"));

        let err = check_error(vec![Value::from(r#"{"error":"denied"}"#)]).unwrap_err();
        assert!(matches!(err, BridgeError::Host(msg) if msg == "denied"));
    }

    #[test]
    fn check_error_passes_ordinary_replies() {
        for values in [
            vec![],
            vec![Value::from("plain text")],
            vec![Value::from(r#"{"Error":false,"Data":"ok"}"#)],
            vec![Value::from(r#"{"Name":"main"}"#)],
            vec![Value::from(3)],
        ] {
            assert_eq!(check_error(values.clone()).unwrap(), values);
        }
    }

    #[test]
    fn ignore_discards() {
        ignore(vec![Value::from("x")]).unwrap();
    }
}
