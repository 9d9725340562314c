//! Flattening of invoice records into summary rows for display and export.

use crate::extract::{BANK_ACCOUNT, BANK_NAME, INVOICE_DATE, NAME, TOTAL_AMOUNT};
use crate::types::{InvoiceRecord, NormalizedInvoice};
use serde::Serialize;

/// Column headers, in row order.
pub const SUMMARY_HEADERS: &[&str] = &[
    "序号",
    "文件名",
    "项目名称",
    "发票金额",
    "发票数量",
    "销售方",
    "开票日期",
    "购买方",
    "开户行",
    "银行账号",
    "状态",
    "错误信息",
];

/// Index of the amount column in [`SUMMARY_HEADERS`].
pub const AMOUNT_COLUMN: usize = 3;

const DEFAULT_AMOUNT: &str = "0.00";

/// One line of the summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub index: usize,
    pub file_name: String,
    pub item_name: String,
    pub total_amount: String,
    pub invoice_count: String,
    pub seller: String,
    pub invoice_date: String,
    pub purchaser: String,
    pub bank_name: String,
    pub bank_account: String,
    pub status: String,
    pub error: String,
}

impl SummaryRow {
    /// `index` is the 1-based position in the batch.
    pub fn from_record(index: usize, record: &InvoiceRecord) -> Self {
        let empty = NormalizedInvoice::default();
        let invoice = record.invoice.as_ref().unwrap_or(&empty);
        let get = |map: &crate::types::FieldMap, key: &str| map.get(key).cloned().unwrap_or_default();

        Self {
            index,
            file_name: record.file_name.clone(),
            item_name: invoice.first_item_name().unwrap_or_default().to_string(),
            total_amount: format!(
                "¥{}",
                invoice
                    .amount_info
                    .get(TOTAL_AMOUNT)
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_AMOUNT)
            ),
            invoice_count: "1".to_string(),
            seller: get(&invoice.seller_info, NAME),
            invoice_date: get(&invoice.basic_info, INVOICE_DATE),
            purchaser: get(&invoice.purchaser_info, NAME),
            bank_name: get(&invoice.seller_info, BANK_NAME),
            bank_account: get(&invoice.seller_info, BANK_ACCOUNT),
            status: record.status.table_label().to_string(),
            error: record.error.clone().unwrap_or_default(),
        }
    }

    /// Cell values in [`SUMMARY_HEADERS`] order.
    pub fn cells(&self) -> Vec<String> {
        vec![
            self.index.to_string(),
            self.file_name.clone(),
            self.item_name.clone(),
            self.total_amount.clone(),
            self.invoice_count.clone(),
            self.seller.clone(),
            self.invoice_date.clone(),
            self.purchaser.clone(),
            self.bank_name.clone(),
            self.bank_account.clone(),
            self.status.clone(),
            self.error.clone(),
        ]
    }
}

/// One row per record, numbered from 1.
pub fn summary_rows(records: &[InvoiceRecord]) -> Vec<SummaryRow> {
    records
        .iter()
        .enumerate()
        .map(|(i, record)| SummaryRow::from_record(i + 1, record))
        .collect()
}

/// Tab-separated rendering with a header line, ready to paste into a spreadsheet.
pub fn to_tsv(rows: &[SummaryRow]) -> String {
    let mut out = SUMMARY_HEADERS.join("\t");
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.cells().iter().map(|c| tsv_cell(c)).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn tsv_cell(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}
