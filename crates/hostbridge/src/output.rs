use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hostbridge_codec::Value;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// JSON form of one tagged value. Bytes are hex-encoded.
#[derive(Serialize, Debug, PartialEq)]
pub struct ValueOutput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: serde_json::Value,
}

impl ValueOutput {
    pub fn from_value(value: &Value) -> Self {
        let json = match value {
            Value::Absent => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Text(text) => serde_json::Value::String(text.clone()),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
            Value::Bytes(bytes) => serde_json::Value::String(hex::encode(bytes)),
        };
        Self {
            kind: value.tag().name(),
            value: json,
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    source: &'a str,
    values: Vec<ValueOutput>,
    timestamp: String,
}

/// Print one received message. `source` names where it came from (a
/// channel, a URL, or `stdin`).
pub fn print_values(values: &[Value], source: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                source,
                values: values.iter().map(ValueOutput::from_value).collect(),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "TYPE", "SOURCE", "VALUE"]);
            for (index, value) in values.iter().enumerate() {
                table.add_row(vec![
                    index.to_string(),
                    value.tag().name().to_string(),
                    source.to_string(),
                    value_preview(value),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (index, value) in values.iter().enumerate() {
                println!(
                    "[{index}] source={source} type={} value={}",
                    value.tag().name(),
                    value_preview(value)
                );
            }
        }
        OutputFormat::Raw => {
            for value in values {
                match value {
                    Value::Text(text) => print_raw(text.as_bytes()),
                    Value::Bytes(bytes) => print_raw(bytes),
                    other => print_raw(other.to_string().as_bytes()),
                }
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn value_preview(value: &Value) -> String {
    match value {
        Value::Text(text) => text.clone(),
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if !text.is_empty() => format!("<bytes {}> {text}", bytes.len()),
            _ => format!("<bytes {}> {}", bytes.len(), hex::encode(bytes)),
        },
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_output_json_shapes() {
        let out = ValueOutput::from_value(&Value::from(vec![0xde_u8, 0xad]));
        assert_eq!(out.kind, "bytes");
        assert_eq!(out.value, serde_json::json!("dead"));

        assert_eq!(
            serde_json::to_string(&ValueOutput::from_value(&Value::from(42))).unwrap(),
            r#"{"type":"number","value":42.0}"#
        );
        assert_eq!(
            ValueOutput::from_value(&Value::Absent).value,
            serde_json::Value::Null
        );
        assert_eq!(
            ValueOutput::from_value(&Value::Number(f64::NAN)).value,
            serde_json::json!("NaN")
        );
    }
}
