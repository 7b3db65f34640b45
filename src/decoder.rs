//! Result decoding: turns a raw [`RunOutcome`] into a [`ProcessingResult`].
//!
//! Decoding never fails. Malformed analyzer output becomes an error result that
//! carries the raw text, so callers always get something they can render.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::analyzer::RunOutcome;
use crate::error::FailureKind;

pub const INVALID_RESPONSE_MESSAGE: &str = "invalid analyzer response";

/// Top-level `status` of a result document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Success => write!(f, "success"),
            ResultStatus::Error => write!(f, "error"),
        }
    }
}

/// The normalized outcome of one job. Immutable once produced.
///
/// The decoded document is kept as-is, so a result serializes back to exactly
/// the keys and values the analyzer emitted, explicit `null`s included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct ProcessingResult {
    status: ResultStatus,
    fields: Map<String, Value>,
}

/// Shape a result document must have. Known keys may be absent or `null`.
#[derive(Deserialize)]
#[allow(dead_code)]
struct ResultSchema {
    status: ResultStatus,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    data: Option<Map<String, Value>>,
    metadata: Option<Map<String, Value>>,
    message: Option<String>,
    raw: Option<String>,
}

impl TryFrom<Map<String, Value>> for ProcessingResult {
    type Error = serde_json::Error;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let schema: ResultSchema = serde_json::from_value(Value::Object(fields.clone()))?;
        Ok(Self {
            status: schema.status,
            fields,
        })
    }
}

impl From<ProcessingResult> for Map<String, Value> {
    fn from(result: ProcessingResult) -> Self {
        result.fields
    }
}

impl ProcessingResult {
    /// An error result with only a message.
    pub fn error(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("status".into(), Value::from(ResultStatus::Error.to_string()));
        fields.insert("message".into(), Value::String(message.into()));
        Self {
            status: ResultStatus::Error,
            fields,
        }
    }

    fn invalid_response(raw: String) -> Self {
        let mut result = Self::error(INVALID_RESPONSE_MESSAGE);
        result.fields.insert("raw".into(), Value::String(raw));
        result
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    /// Document classification label chosen by the analyzer.
    pub fn doc_type(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.fields.get("data").and_then(Value::as_object)
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.fields.get("metadata").and_then(Value::as_object)
    }

    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    /// Unparsed analyzer output, present only on decode failure.
    pub fn raw(&self) -> Option<&str> {
        self.str_field("raw")
    }

    /// The whole document, in the form it serializes to.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Source file name (`metadata.arquivo`, or top-level `arquivo` on analyzer errors).
    pub fn file_name(&self) -> Option<&str> {
        self.metadata_str("arquivo").or_else(|| self.str_field("arquivo"))
    }

    pub fn processed_at(&self) -> Option<&str> {
        self.metadata_str("processado_em")
    }

    pub fn pages(&self) -> Option<u64> {
        self.metadata()
            .and_then(|m| m.get("paginas"))
            .and_then(Value::as_u64)
    }

    /// Extraction method, from metadata or, for the image analyzer, from data.
    pub fn processing_method(&self) -> Option<&str> {
        self.metadata_str("metodo_processamento").or_else(|| {
            self.data()
                .and_then(|d| d.get("metodo_processamento"))
                .and_then(Value::as_str)
        })
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }
}

/// Maps every [`RunOutcome`] to exactly one [`ProcessingResult`].
#[derive(Debug, Clone, Copy)]
pub struct ResultDecoder {
    deadline: Duration,
}

impl ResultDecoder {
    /// `deadline` is only used to word the timeout message.
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn decode(&self, outcome: RunOutcome) -> ProcessingResult {
        self.decode_classified(outcome).0
    }

    /// Decode and report which failure kind, if any, the result represents.
    pub fn decode_classified(&self, outcome: RunOutcome) -> (ProcessingResult, Option<FailureKind>) {
        match outcome {
            RunOutcome::Completed(raw) => match parse_output(&raw) {
                Some(result) if result.is_success() => (result, None),
                Some(result) => (result, Some(FailureKind::Reported)),
                None => {
                    warn!(bytes = raw.len(), "analyzer output is not a valid result document");
                    (ProcessingResult::invalid_response(raw), Some(FailureKind::Decode))
                }
            },
            RunOutcome::ExecError { kind, message } => (ProcessingResult::error(message), Some(kind)),
            RunOutcome::TimedOut => (
                ProcessingResult::error(timeout_message(self.deadline)),
                Some(FailureKind::Timeout),
            ),
        }
    }
}

pub fn timeout_message(deadline: Duration) -> String {
    format!("processing timed out after {}", format_deadline(deadline))
}

fn format_deadline(deadline: Duration) -> String {
    if deadline.subsec_nanos() == 0 {
        format!("{}s", deadline.as_secs())
    } else {
        format!("{}ms", deadline.as_millis())
    }
}

/// Parse analyzer output as a result document.
///
/// Deliberately wider than "stdout is one JSON document": when the strict parse
/// fails, parsing is retried from the first line that opens a JSON object,
/// since analyzers may print progress lines before their result.
pub fn parse_output(raw: &str) -> Option<ProcessingResult> {
    if let Ok(result) = serde_json::from_str::<ProcessingResult>(raw.trim()) {
        return Some(result);
    }

    let mut offset = 0;
    for line in raw.split_inclusive('\n') {
        if line.trim_start().starts_with('{') {
            return serde_json::from_str::<ProcessingResult>(raw[offset..].trim()).ok();
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::INVOICE_JSON;
    use serde_json::json;

    fn decoder() -> ResultDecoder {
        ResultDecoder::new(Duration::from_secs(60))
    }

    #[test]
    fn valid_output_is_returned_field_for_field() {
        let result = decoder().decode(RunOutcome::Completed(INVOICE_JSON.into()));
        let expected: Value = serde_json::from_str(INVOICE_JSON).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), expected);
        assert_eq!(result.doc_type(), Some("invoice"));
        assert_eq!(result.file_name(), Some("invoice.pdf"));
        assert_eq!(result.processed_at(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn explicit_nulls_survive_reserialization() {
        let raw = r#"{"status":"success","type":null,"data":{"x":"1"},"metadata":{"arquivo":"a.pdf","paginas":null},"message":null,"versao":null}"#;
        let (result, failure) = decoder().decode_classified(RunOutcome::Completed(raw.into()));

        assert_eq!(failure, None);
        assert_eq!(result.doc_type(), None);
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), expected);
    }

    #[test]
    fn wrongly_typed_known_field_is_invalid() {
        let raw = r#"{"status":"success","data":"not an object"}"#;
        let (result, failure) = decoder().decode_classified(RunOutcome::Completed(raw.into()));
        assert_eq!(result.message(), Some(INVALID_RESPONSE_MESSAGE));
        assert_eq!(failure, Some(FailureKind::Decode));
    }

    #[test]
    fn not_json_keeps_raw_output() {
        let (result, failure) = decoder().decode_classified(RunOutcome::Completed("not json".into()));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "message": "invalid analyzer response", "raw": "not json"})
        );
        assert_eq!(failure, Some(FailureKind::Decode));
    }

    #[test]
    fn missing_or_unknown_status_is_invalid() {
        for raw in [r#"{"type":"RG"}"#, r#"{"status":"pending"}"#, "[1,2,3]", ""] {
            let result = decoder().decode(RunOutcome::Completed(raw.into()));
            assert_eq!(result.message(), Some(INVALID_RESPONSE_MESSAGE), "{raw:?}");
            assert_eq!(result.raw(), Some(raw));
        }
    }

    #[test]
    fn analyzer_reported_error_passes_through() {
        let raw = r#"{"status":"error","message":"Falha na extração: arquivo corrompido","arquivo":"scan.pdf"}"#;
        let (result, failure) = decoder().decode_classified(RunOutcome::Completed(raw.into()));

        assert_eq!(result.status(), ResultStatus::Error);
        assert_eq!(result.file_name(), Some("scan.pdf"));
        assert!(result.raw().is_none());
        assert_eq!(failure, Some(FailureKind::Reported));
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_value(&result).unwrap(), expected);
    }

    #[test]
    fn progress_lines_before_json_are_skipped() {
        let raw = "Usando OCR com Gemini Vision para: /tmp/scan.pdf\n{\n  \"status\": \"success\",\n  \"type\": \"DOCUMENTO\",\n  \"data\": {\"nome\": \"MARIA\"},\n  \"metadata\": {\"arquivo\": \"scan.pdf\", \"paginas\": 2, \"metodo_processamento\": \"OCR_Gemini_Vision\", \"processado_em\": \"01/01/2024 10:00:00\"}\n}\n";
        let (result, failure) = decoder().decode_classified(RunOutcome::Completed(raw.into()));

        assert!(result.is_success());
        assert_eq!(failure, None);
        assert_eq!(result.pages(), Some(2));
        assert_eq!(result.processing_method(), Some("OCR_Gemini_Vision"));
    }

    #[test]
    fn nested_data_and_image_method_are_read() {
        let raw = json!({
            "status": "success",
            "type": "IMAGE",
            "data": {
                "texto_extraido": "abc",
                "metodo_processamento": "Gemini_Vision",
                "campos": {"nome": "JOAO"}
            },
            "metadata": {"arquivo": "foto.png", "processado_em": "01/01/2024 10:00:00"}
        });
        let result = decoder().decode(RunOutcome::Completed(raw.to_string()));
        assert_eq!(result.processing_method(), Some("Gemini_Vision"));
        assert_eq!(result.data().unwrap()["campos"]["nome"], "JOAO");
        assert_eq!(result.pages(), None);
    }

    #[test]
    fn exec_error_keeps_message() {
        let (result, failure) = decoder().decode_classified(RunOutcome::ExecError {
            kind: FailureKind::Runtime,
            message: "analyzer exited with exit code 1".into(),
        });
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "message": "analyzer exited with exit code 1"})
        );
        assert_eq!(failure, Some(FailureKind::Runtime));
    }

    #[test]
    fn timeout_message_names_deadline() {
        let result = decoder().decode(RunOutcome::TimedOut);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "message": "processing timed out after 60s"})
        );
        assert_eq!(
            timeout_message(Duration::from_millis(250)),
            "processing timed out after 250ms"
        );
    }
}
