//! Helpers for tests that need real analyzer processes.
//!
//! Analyzers are written as small shell scripts and run through `sh`, so the
//! tests never exec a file that was just written.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::analyzer::{AnalyzerInvocation, AnalyzerTable};

/// Write a shell script named `name` into `dir` and return its path.
pub fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write analyzer script");
    path
}

/// Table where both analyzers are shell scripts run through `sh`.
pub fn sh_table(document: &Path, image: &Path) -> AnalyzerTable {
    AnalyzerTable::new(document, image).with_interpreter("sh")
}

/// Invocation of a single script through `sh` with the given output cap.
pub fn sh_invocation(script: &Path, file: &str, max_output_bytes: usize) -> AnalyzerInvocation {
    sh_table(script, script).invocation("application/pdf", Path::new(file), max_output_bytes)
}

pub const INVOICE_JSON: &str = r#"{"status":"success","type":"invoice","data":{"total":"120.00"},"metadata":{"arquivo":"invoice.pdf","processado_em":"2024-01-01T00:00:00Z"}}"#;
