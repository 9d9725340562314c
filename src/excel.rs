use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::table::{SummaryRow, AMOUNT_COLUMN, SUMMARY_HEADERS};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet, XlsxError};
use tracing::info;

pub const DEFAULT_SHEET_NAME: &str = "发票汇总";

const EXPORT_FILE_PREFIX: &str = "发票识别结果";

/// Remove characters that can corrupt the sheet XML ("unreadable content" in Excel).
/// Drops control chars except tab, newline and CR.
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

/// Parse an amount cell, ignoring currency signs, thousands separators and spaces.
fn parse_amount(value: &str) -> Option<f64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(*c, '¥' | '￥' | ',' | ' '))
        .collect();
    cleaned.parse().ok()
}

struct SheetFormats {
    header: Format,
    text: Format,
    index: Format,
    amount: Format,
}

impl SheetFormats {
    fn new() -> Self {
        Self {
            header: Format::new()
                .set_bold()
                .set_background_color(Color::RGB(0x2563EB))
                .set_font_color(Color::RGB(0xFFFFFF)),
            text: Format::new().set_text_wrap(),
            index: Format::new().set_align(FormatAlign::Center),
            amount: Format::new()
                .set_num_format("#,##0.00")
                .set_align(FormatAlign::Right),
        }
    }

    /// Index and amount columns become numbers when they parse; everything else,
    /// and anything unparseable, is written as sanitized text.
    fn write_cell(&self, worksheet: &mut Worksheet, row: u32, col: usize, value: &str) -> Result<(), XlsxError> {
        let number_format = match col {
            0 => Some(&self.index),
            AMOUNT_COLUMN => Some(&self.amount),
            _ => None,
        };
        let col = col as u16;
        if let Some((num, format)) = number_format.and_then(|f| parse_amount(value).map(|n| (n, f))) {
            worksheet.write_number_with_format(row, col, num, format)?;
        } else {
            worksheet.write_string_with_format(row, col, sanitize_cell(value), &self.text)?;
        }
        Ok(())
    }
}

/// Estimate column width from text length (char count × 2.2 for CJK-heavy text, clamped 8–50).
fn estimate_text_width(text: &str) -> f64 {
    let units: f64 = text
        .chars()
        .map(|c| if c.is_ascii() { 1.1 } else { 2.2 })
        .sum();
    units.clamp(8.0, 50.0)
}

/// Per-column widths: max of header width and cell widths.
fn calculate_column_widths(rows: &[SummaryRow]) -> Vec<f64> {
    let mut widths: Vec<f64> = SUMMARY_HEADERS.iter().map(|h| estimate_text_width(h)).collect();
    for row in rows {
        for (col, cell) in row.cells().iter().enumerate() {
            let w = estimate_text_width(cell);
            if col < widths.len() && w > widths[col] {
                widths[col] = w;
            }
        }
    }
    widths
}

fn build_workbook(rows: &[SummaryRow], sheet_name: Option<&str>) -> Result<Workbook> {
    if rows.is_empty() {
        return Err(Error::NothingToExport);
    }
    let sheet_name = sheet_name.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(DEFAULT_SHEET_NAME);

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    let formats = SheetFormats::new();

    for (col, &w) in calculate_column_widths(rows).iter().enumerate() {
        worksheet.set_column_width(col as u16, w)?;
    }

    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &formats.header)?;
    }

    for (row_idx, summary) in rows.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        for (col, value) in summary.cells().iter().enumerate() {
            formats.write_cell(worksheet, row, col, value)?;
        }
    }

    worksheet.set_freeze_panes(1, 0)?;
    Ok(workbook)
}

/// `<dir>/发票识别结果_<timestamp>.xlsx`, with a counter suffix if the name is taken.
/// Without `dir`, the Downloads folder (or Desktop) is used.
pub fn default_export_path(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => dirs::download_dir()
            .or_else(dirs::desktop_dir)
            .ok_or_else(|| Error::Config("could not find Downloads or Desktop folder".to_string()))?,
    };
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("{}_{}.xlsx", EXPORT_FILE_PREFIX, stamp));
    let mut counter = 2u32;
    while path.exists() {
        path = dir.join(format!("{}_{}_{}.xlsx", EXPORT_FILE_PREFIX, stamp, counter));
        counter += 1;
    }
    Ok(path)
}

/// Write the summary rows to a new workbook. Returns the saved file path.
pub fn export_rows_to_excel(
    rows: &[SummaryRow],
    path_override: Option<&Path>,
    export_dir: Option<&Path>,
    sheet_name: Option<&str>,
) -> Result<PathBuf> {
    let mut workbook = build_workbook(rows, sheet_name)?;
    let path = match path_override {
        Some(p) => {
            let mut pb = p.to_path_buf();
            if pb.extension().and_then(|e| e.to_str()) != Some("xlsx") {
                pb.set_extension("xlsx");
            }
            pb
        }
        None => default_export_path(export_dir)?,
    };
    workbook.save(&path)?;
    info!("exported {} row(s) to {}", rows.len(), path.display());
    Ok(path)
}

/// Same workbook as [`export_rows_to_excel`], kept in memory.
pub fn export_rows_to_buffer(rows: &[SummaryRow], sheet_name: Option<&str>) -> Result<Vec<u8>> {
    let mut workbook = build_workbook(rows, sheet_name)?;
    Ok(workbook.save_to_buffer()?)
}
