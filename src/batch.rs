//! Per-file processing: OCR outcome -> [`InvoiceRecord`].
//!
//! A failure on one file only ever produces a failure record for that file.

use crate::extract::extract;
use crate::types::InvoiceRecord;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What the OCR side delivers for a single file.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrOutcome {
    Response(Value),
    Failed(String),
}

impl OcrOutcome {
    /// Interpret a stored OCR result.
    ///
    /// `{"success": true, "data": ...}` / `{"success": false, "error": ...}` envelopes
    /// are unwrapped; any other value is taken as the raw vendor response.
    pub fn from_json(value: Value) -> Self {
        let Some(success) = value.get("success").and_then(Value::as_bool) else {
            return OcrOutcome::Response(value);
        };
        if success {
            match value.get("data") {
                Some(data) => OcrOutcome::Response(data.clone()),
                None => OcrOutcome::Failed("OCR结果中没有数据".to_string()),
            }
        } else {
            OcrOutcome::Failed(describe_error(value.get("error")))
        }
    }
}

fn describe_error(error: Option<&Value>) -> String {
    match error {
        None | Some(Value::Null) => "OCR失败".to_string(),
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(fields)) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Value::Object(fields.clone()).to_string()),
        Some(other) => other.to_string(),
    }
}

/// Normalize one file's OCR outcome. Never fails.
pub fn process_outcome(file_name: &str, outcome: &OcrOutcome) -> InvoiceRecord {
    match outcome {
        OcrOutcome::Response(raw) => match extract(raw) {
            Ok(invoice) => {
                let record = InvoiceRecord::success(file_name, invoice);
                debug!(file = file_name, status = record.status.label(), "invoice normalized");
                record
            }
            Err(e) => {
                warn!(file = file_name, "extraction failed: {}", e);
                InvoiceRecord::failure(file_name, e.to_string())
            }
        },
        OcrOutcome::Failed(message) => {
            warn!(file = file_name, "OCR failed: {}", message);
            InvoiceRecord::failure(file_name, message.clone())
        }
    }
}

/// Results of one batch, owned by the caller. Records keep input order.
#[derive(Debug, Clone, Default)]
pub struct BatchResults {
    records: Vec<InvoiceRecord>,
}

impl BatchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: InvoiceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[InvoiceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<InvoiceRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Extend<InvoiceRecord> for BatchResults {
    fn extend<I: IntoIterator<Item = InvoiceRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

/// Process `(file name, outcome)` pairs one after another.
pub fn process_batch(items: &[(String, OcrOutcome)]) -> BatchResults {
    let mut results = BatchResults::new();
    results.extend(items.iter().map(|(name, outcome)| process_outcome(name, outcome)));
    log_summary(&results);
    results
}

/// Same as [`process_batch`], spread over the rayon thread pool.
pub fn process_batch_parallel(items: &[(String, OcrOutcome)]) -> BatchResults {
    let records: Vec<InvoiceRecord> = items
        .par_iter()
        .map(|(name, outcome)| process_outcome(name, outcome))
        .collect();
    let mut results = BatchResults::new();
    results.extend(records);
    log_summary(&results);
    results
}

fn log_summary(results: &BatchResults) {
    info!(
        "processed {} invoice(s): {} succeeded, {} failed",
        results.len(),
        results.success_count(),
        results.failure_count()
    );
}
