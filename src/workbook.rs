//! Excel output
//!
//! Writes one worksheet per coin/currency pair into a workbook named after the run date.

use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;
use thiserror::Error;

use crate::table::{Cell, Table};

/// Excel's limit on worksheet name length
const MAX_SHEET_NAME_LEN: usize = 31;

/// Characters Excel does not allow in worksheet names
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// Errors that can occur when writing the workbook
#[derive(Debug, Error)]
pub enum WorkbookError {
    /// The spreadsheet library rejected the data or failed to save
    #[error("Failed to write workbook: {0}")]
    Xlsx(#[from] XlsxError),

    /// A table is larger than a worksheet can hold
    #[error("Sheet '{0}' exceeds the worksheet size limits")]
    TooLarge(String),
}

/// Output file name for a run on `date`
pub fn output_file_name(date: NaiveDate) -> String {
    format!("coingecko_data_{}.xlsx", date.format("%d-%m-%Y"))
}

/// Replaces characters Excel rejects in worksheet names
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if FORBIDDEN_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// Keeps at most `max` characters of `s`
fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Worksheet name for a pair, made safe for Excel
///
/// Only the coin part is shortened to fit the length limit, so `_{currency}` survives
/// unless the currency alone is too long.
pub fn sheet_name(coin_id: &str, currency: &str) -> String {
    let suffix = format!("_{}", sanitize(currency));
    let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
    let name = format!("{}{}", truncate_chars(&sanitize(coin_id), room), suffix);
    truncate_chars(&name, MAX_SHEET_NAME_LEN)
}

/// One worksheet and the pair it was built from
#[derive(Debug)]
struct SheetEntry {
    coin_id: String,
    currency: String,
    name: String,
    table: Table,
}

impl SheetEntry {
    fn is_pair(&self, coin_id: &str, currency: &str) -> bool {
        self.coin_id.eq_ignore_ascii_case(coin_id) && self.currency.eq_ignore_ascii_case(currency)
    }
}

/// Ordered (coin, currency) to table mapping, one worksheet per pair
///
/// A repeated pair replaces its table in place. Distinct pairs whose names collide
/// (Excel compares names case-insensitively) get a `~2`, `~3`, ... suffix.
#[derive(Debug, Default)]
pub struct Sheets {
    entries: Vec<SheetEntry>,
}

impl Sheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the table for a pair and returns the worksheet name it was given
    pub fn insert(&mut self, coin_id: &str, currency: &str, table: Table) -> &str {
        if let Some(idx) = self.entries.iter().position(|e| e.is_pair(coin_id, currency)) {
            self.entries[idx].table = table;
            return &self.entries[idx].name;
        }

        let name = self.unique_name(&sheet_name(coin_id, currency));
        self.entries.push(SheetEntry {
            coin_id: coin_id.to_string(),
            currency: currency.to_string(),
            name,
            table,
        });
        &self.entries[self.entries.len() - 1].name
    }

    fn is_taken(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// `base` itself when free, otherwise the first free `base~N`, shortened to fit
    fn unique_name(&self, base: &str) -> String {
        if !self.is_taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| {
                let suffix = format!("~{}", n);
                let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.len());
                format!("{}{}", truncate_chars(base, room), suffix)
            })
            .find(|candidate| !self.is_taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.table)
    }
}

/// Writes a header row followed by the data rows, no index column
fn write_table(
    worksheet: &mut Worksheet,
    name: &str,
    table: &Table,
    header: &Format,
) -> Result<(), WorkbookError> {
    let too_large = || WorkbookError::TooLarge(name.to_string());

    for (col, column) in table.columns.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| too_large())?;
        worksheet.write_string_with_format(0, col, column, header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1).map_err(|_| too_large())?;
        for (col, cell) in row.iter().enumerate() {
            let col = u16::try_from(col).map_err(|_| too_large())?;
            match cell {
                Cell::Empty => {}
                Cell::Number(n) if !n.is_finite() => {}
                Cell::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
            }
        }
    }

    Ok(())
}

/// Writes every sheet into a new workbook at `path`, replacing any existing file
pub fn write_workbook(path: &Path, sheets: &Sheets) -> Result<(), WorkbookError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for entry in &sheets.entries {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&entry.name)?;
        write_table(worksheet, &entry.name, &entry.table, &header)?;
    }

    workbook.save(path)?;
    Ok(())
}
