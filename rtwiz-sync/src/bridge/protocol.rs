//! Bridge wire format
//!
//! Requests are URL-encoded forms with an `action` field (`test`, `query`,
//! `tables`) and, for `query`, a `sql` field. Replies are JSON objects:
//! `{"status":"success", ...payload}` or `{"error":"message"}`.

use rtwiz_common::schema::JsonRow;
use rtwiz_common::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// Longest body excerpt carried in a malformed-response error
const BODY_EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    Test,
    Query,
    Tables,
}

impl BridgeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeAction::Test => "test",
            BridgeAction::Query => "query",
            BridgeAction::Tables => "tables",
        }
    }
}

impl fmt::Display for BridgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful bridge reply; only the payload key for the action is set
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct BridgeReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<JsonRow>>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Classify an HTTP status and body into a reply or an error
///
/// - body is not a JSON object of the expected shape: `MalformedResponse`
/// - `{"error": ...}` with any status code: `Query`
/// - non-2xx without an `error` key: `Query`
/// - `status` other than `"success"`: `MalformedResponse`
pub fn parse_reply(http_status: u16, body: &str) -> Result<BridgeReply> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|_| Error::MalformedResponse(format!("not JSON: {}", excerpt(body))))?;

    if !value.is_object() {
        return Err(Error::MalformedResponse(format!(
            "expected a JSON object: {}",
            excerpt(body)
        )));
    }

    let reply: BridgeReply = serde_json::from_value(value)
        .map_err(|e| Error::MalformedResponse(format!("{}: {}", e, excerpt(body))))?;

    if let Some(message) = &reply.error {
        return Err(Error::Query(message.clone()));
    }

    if !(200..300).contains(&http_status) {
        return Err(Error::Query(format!("bridge returned HTTP {}", http_status)));
    }

    match reply.status.as_deref() {
        Some("success") => Ok(reply),
        Some(other) => Err(Error::MalformedResponse(format!(
            "unexpected status '{}'",
            other
        ))),
        None => Err(Error::MalformedResponse(format!(
            "reply has neither status nor error: {}",
            excerpt(body)
        ))),
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_success() {
        let reply = parse_reply(
            200,
            r#"{"status":"success","data":[{"FIELD_ID":"1","SITE_ID":"2"}],"count":1}"#,
        )
        .unwrap();
        let rows = reply.data.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["FIELD_ID"], "1");
        assert_eq!(reply.count, Some(1));
    }

    #[test]
    fn test_tables_and_test_success() {
        let reply = parse_reply(200, r#"{"status":"success","tables":["FIELD","SMSGROUP"]}"#)
            .unwrap();
        assert_eq!(reply.tables.unwrap(), vec!["FIELD", "SMSGROUP"]);

        let reply = parse_reply(200, r#"{"status":"success","message":"Connection OK"}"#).unwrap();
        assert_eq!(reply.message.as_deref(), Some("Connection OK"));
    }

    #[test]
    fn test_error_reply_is_query_error() {
        let err = parse_reply(500, r#"{"error":"Syntax error in UPDATE statement."}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Query(msg) if msg.contains("Syntax error")));

        let err = parse_reply(400, r#"{"error":"SQL query required"}"#).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_non_2xx_without_error_key() {
        let err = parse_reply(503, r#"{"status":"success"}"#).unwrap_err();
        assert!(matches!(err, Error::Query(msg) if msg.contains("503")));
    }

    #[test]
    fn test_malformed_bodies() {
        let html = "<br /><b>Warning</b>: odbc_connect() failed";
        assert!(matches!(parse_reply(200, html), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_reply(200, "[1,2]"), Err(Error::MalformedResponse(_))));
        assert!(matches!(parse_reply(200, "{}"), Err(Error::MalformedResponse(_))));
        assert!(matches!(
            parse_reply(200, r#"{"status":"failed"}"#),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_reply(200, r#"{"status":"success","data":[1,2]}"#),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let body = "x".repeat(1000);
        let err = parse_reply(200, &body).unwrap_err();
        let text = err.to_string();
        assert!(text.len() < 300);
        assert!(text.ends_with("..."));
    }
}
