use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const ENVELOPE_SCHEMA_VERSION: &str = "tieout.envelope.v1";

pub type EnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeWarning {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// JSON document printed by every CLI command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: EnvelopeMeta,
    pub warnings: Vec<EnvelopeWarning>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
}

/// Carries a failed envelope through `anyhow` so `main` can print it and
/// pick the exit code.
#[derive(Debug, Clone)]
pub struct EnvelopeCommandFailure {
    envelope: Envelope,
    validation: bool,
}

impl EnvelopeCommandFailure {
    #[must_use]
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            validation: false,
        }
    }

    /// Marks the failure as rejected input rather than a runtime fault.
    #[must_use]
    pub fn validation(envelope: Envelope) -> Self {
        Self {
            envelope,
            validation: true,
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn is_validation_failure(&self) -> bool {
        self.validation
    }
}

impl Display for EnvelopeCommandFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("envelope serialization failure"),
        }
    }
}

impl std::error::Error for EnvelopeCommandFailure {}

impl Envelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        Self::base(command, true).with_data(data)
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(EnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = EnvelopeMeta::new();
        meta.insert("schema_version".to_string(), json!(ENVELOPE_SCHEMA_VERSION));

        Self {
            ok,
            command: command.into(),
            generated_at_utc: generated_at_utc_now(),
            data: None,
            meta,
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.push(EnvelopeWarning {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn generated_at_utc_now() -> String {
    OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .ok()
        .and_then(|now| now.format(&Rfc3339).ok())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ENVELOPE_SCHEMA_VERSION, Envelope, EnvelopeCommandFailure};

    #[test]
    fn ok_envelope_carries_schema_version_and_timestamp() {
        let envelope = Envelope::ok("tie", json!({"rows": []}))
            .with_meta("row_count", json!(0))
            .with_warning("no_amounts", "no amount columns selected");

        assert!(envelope.ok);
        assert!(envelope.generated_at_utc.ends_with('Z'));
        assert_eq!(
            envelope.meta.get("schema_version"),
            Some(&json!(ENVELOPE_SCHEMA_VERSION))
        );
        assert_eq!(envelope.warnings[0].code, "no_amounts");
        assert!(envelope.error.is_none());
    }

    #[test]
    fn failure_display_is_the_json_envelope() {
        let envelope = Envelope::error("tie", "key_not_found", "Mart key \"x\" not found")
            .with_error_details(json!({"side": "mart"}));
        let failure = EnvelopeCommandFailure::validation(envelope);
        assert!(failure.is_validation_failure());

        let parsed: serde_json::Value =
            serde_json::from_str(&failure.to_string()).expect("display should be JSON");
        assert_eq!(parsed.get("ok"), Some(&json!(false)));
        assert_eq!(
            parsed.pointer("/error/details/side").and_then(|v| v.as_str()),
            Some("mart")
        );
    }
}
