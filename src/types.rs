use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Display name -> value. Only present, non-empty source fields end up here.
pub type FieldMap = BTreeMap<String, String>;

/// One invoice line (货物名称 / 数量 / 金额), holding only the fields that had a value.
pub type LineItem = FieldMap;

/// Flat, display-ready invoice produced from one raw OCR response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInvoice {
    pub basic_info: FieldMap,
    pub seller_info: FieldMap,
    pub purchaser_info: FieldMap,
    pub amount_info: FieldMap,
    pub invoice_details: Vec<LineItem>,
}

impl NormalizedInvoice {
    /// Name of the first line item, used as the "project" column in summaries.
    pub fn first_item_name(&self) -> Option<&str> {
        self.invoice_details
            .first()
            .and_then(|item| item.get(crate::extract::ITEM_NAME))
            .map(String::as_str)
    }
}

/// Bank details recovered from the free-text remarks. Either field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankInfo {
    pub bank_name: String,
    pub account_number: String,
}

impl BankInfo {
    pub fn is_complete(&self) -> bool {
        !self.bank_name.is_empty() && !self.account_number.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Success,
    Failure,
}

impl ProcessingStatus {
    pub fn label(self) -> &'static str {
        match self {
            ProcessingStatus::Success => "成功",
            ProcessingStatus::Failure => "失败",
        }
    }

    /// Label with the status marker used in the summary table.
    pub fn table_label(self) -> &'static str {
        match self {
            ProcessingStatus::Success => "✅ 成功",
            ProcessingStatus::Failure => "❌ 失败",
        }
    }
}

/// Per-file result handed to the rendering/export side. Failed files still get a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub file_name: String,
    pub processing_time: String,
    pub status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<NormalizedInvoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InvoiceRecord {
    pub fn success(file_name: impl Into<String>, invoice: NormalizedInvoice) -> Self {
        Self {
            file_name: file_name.into(),
            processing_time: processing_timestamp(),
            status: ProcessingStatus::Success,
            invoice: Some(invoice),
            error: None,
        }
    }

    pub fn failure(file_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            processing_time: processing_timestamp(),
            status: ProcessingStatus::Failure,
            invoice: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ProcessingStatus::Success
    }
}

fn processing_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
