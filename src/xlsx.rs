//! Workbook model for templates, exports and error reports, written out
//! with `rust_xlsxwriter`: plain cells, a bold header row, content-sized
//! columns.

use anyhow::Context;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum XCell {
    Empty,
    Text(String),
    Number(f64),
}

impl From<&str> for XCell {
    fn from(s: &str) -> Self {
        XCell::Text(s.to_string())
    }
}

impl From<String> for XCell {
    fn from(s: String) -> Self {
        XCell::Text(s)
    }
}

impl From<f64> for XCell {
    fn from(n: f64) -> Self {
        XCell::Number(n)
    }
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<XCell>>,
    /// Render the first row bold.
    pub header: bool,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: sheet_name(name),
            rows: Vec::new(),
            header: true,
        }
    }

    pub fn push_row<I, C>(&mut self, cells: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<XCell>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }
}

#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Excel forbids `[]:*?/\` and caps names at 31 characters.
fn sheet_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet".to_string()
    } else {
        cleaned
    }
}

fn cell_width(cell: &XCell) -> usize {
    match cell {
        XCell::Empty => 0,
        XCell::Text(s) => s.chars().count(),
        XCell::Number(n) => n.to_string().len(),
    }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, bold: &Format) -> anyhow::Result<()> {
    worksheet
        .set_name(&sheet.name)
        .with_context(|| format!("invalid sheet name {}", sheet.name))?;

    for (r, row) in sheet.rows.iter().enumerate() {
        let rn = u32::try_from(r).context("too many rows for one sheet")?;
        let header = sheet.header && r == 0;
        for (c, cell) in row.iter().enumerate() {
            let cn = u16::try_from(c).context("too many columns for one sheet")?;
            match cell {
                XCell::Empty => {}
                XCell::Text(s) if header => {
                    worksheet.write_string_with_format(rn, cn, s, bold)?;
                }
                XCell::Text(s) => {
                    worksheet.write_string(rn, cn, s)?;
                }
                // Excel has no NaN or infinity.
                XCell::Number(n) if !n.is_finite() => {}
                XCell::Number(n) if header => {
                    worksheet.write_number_with_format(rn, cn, *n, bold)?;
                }
                XCell::Number(n) => {
                    worksheet.write_number(rn, cn, *n)?;
                }
            }
        }
    }

    let ncols = sheet.rows.iter().map(|r| r.len()).max().unwrap_or(0);
    for c in 0..ncols {
        let widest = sheet
            .rows
            .iter()
            .filter_map(|r| r.get(c))
            .map(cell_width)
            .max()
            .unwrap_or(0);
        let cn = u16::try_from(c).context("too many columns for one sheet")?;
        worksheet.set_column_width(cn, (widest + 2).clamp(8, 60) as f64)?;
    }
    Ok(())
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    fn build(&self) -> anyhow::Result<XlsxWorkbook> {
        let mut workbook = XlsxWorkbook::new();
        let bold = Format::new().set_bold();
        for sheet in &self.sheets {
            write_sheet(workbook.add_worksheet(), sheet, &bold)?;
        }
        Ok(workbook)
    }

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.build()?
            .save_to_buffer()
            .context("failed to serialize workbook")
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
        self.build()?
            .save(path)
            .with_context(|| format!("failed to write {}", path.to_string_lossy()))
    }
}
