//! 📝 Log records: the documents we write, and then anxiously look for.
//!
//! A record has a timestamp, an author, and a message. The message is either a plain
//! string or a small structured object. That's it. That's the whole genre. 🦆

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 📦 One log line, dressed up as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    pub message: LogMessage,
    pub author: String,
}

/// 💬 Plain text, or an object with opinions about availability zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogMessage {
    Text(String),
    Structured(StructuredMessage),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredMessage {
    pub sub_message: String,
    pub availability_zone: String,
    pub system: String,
}

impl LogRecord {
    /// 🔄 Serialize into the schema-agnostic JSON document that backends accept.
    pub fn to_document(&self) -> Result<Value> {
        serde_json::to_value(self).context(
            "💀 A LogRecord refused to become JSON. It has three string fields. \
             This should be impossible, which is exactly when it happens.",
        )
    }

    /// 🔄 Read a stored `_source` back into a record.
    pub fn from_document(document: &Value) -> Result<Self> {
        LogRecord::deserialize(document).context(
            "💀 The stored document does not look like a LogRecord anymore. \
             Somebody (or some ingest pipeline) has been editing our diary.",
        )
    }
}

/// 🕰️ Right now, local offset included, RFC 3339 with millis. The timestamp every record is born with.
pub fn now_timestamp() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_a_text_message_keeps_its_at_sign() -> Result<()> {
        let the_record = LogRecord {
            timestamp: "2024-05-01T10:00:00.000+02:00".to_string(),
            message: LogMessage::Text("log message 2024".to_string()),
            author: "Cyrille".to_string(),
        };

        assert_eq!(
            the_record.to_document()?,
            json!({
                "@timestamp": "2024-05-01T10:00:00.000+02:00",
                "message": "log message 2024",
                "author": "Cyrille"
            })
        );
        Ok(())
    }

    #[test]
    fn the_one_where_the_structured_message_goes_camel_case_and_comes_back() -> Result<()> {
        let the_stored_source = json!({
            "@timestamp": "2024-05-01T10:00:00.000Z",
            "message": {
                "subMessage": "log sub message",
                "availabilityZone": "eu-west-1",
                "system": "my-system"
            },
            "author": "Cyrille"
        });

        let the_record = LogRecord::from_document(&the_stored_source)?;
        assert_eq!(
            the_record.message,
            LogMessage::Structured(StructuredMessage {
                sub_message: "log sub message".to_string(),
                availability_zone: "eu-west-1".to_string(),
                system: "my-system".to_string(),
            })
        );
        assert_eq!(the_record.to_document()?, the_stored_source);
        Ok(())
    }

    #[test]
    fn the_one_where_now_parses_as_rfc3339() {
        let the_now = now_timestamp();
        assert!(
            chrono::DateTime::parse_from_rfc3339(&the_now).is_ok(),
            "'{the_now}' should be RFC 3339. The date field mapping will not be as forgiving as us."
        );
    }
}
