//! Error types.

use serde_json::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Why a raw OCR response could not be turned into a [`NormalizedInvoice`].
///
/// Only the two load-bearing levels (outer payload, nested invoice data) produce
/// these; optional levels degrade to empty values instead.
///
/// [`NormalizedInvoice`]: crate::types::NormalizedInvoice
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("返回数据中没有'Data'字段")]
    MissingPayload,

    #[error("解析Data字符串失败: {source}")]
    MalformedPayload {
        text: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("没有找到嵌套的data字段")]
    MissingInvoiceData { payload: Value },

    #[error("解析过程中出错: {reason}")]
    ExtractionFailed { reason: String, raw: Value },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error("no rows to export")]
    NothingToExport,

    #[error("configuration error: {0}")]
    Config(String),
}
