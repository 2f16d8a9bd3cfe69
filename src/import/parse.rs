use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use super::row::{Cell, RawRow};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("JSON upload must be an array of objects (element {0} is not an object)")]
    NotObject(usize),
    #[error("CSV must have a header row and at least one data row")]
    TooFewLines,
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Spreadsheet has no sheets")]
    NoSheets,
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("File contains no data rows")]
    NoDataRows,
    #[error("File is not valid UTF-8 text")]
    Encoding,
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Result<Self, ParseError> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "json" => Ok(FileFormat::Json),
            "csv" => Ok(FileFormat::Csv),
            "xlsx" => Ok(FileFormat::Xlsx),
            "xls" => Ok(FileFormat::Xls),
            other => Err(ParseError::Unsupported(other.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        Self::from_extension(ext)
    }

    /// Whether the first line of the source is a header line.
    pub fn has_header(self) -> bool {
        !matches!(self, FileFormat::Json)
    }
}

/// Rows paired with the number the user sees for each: the sheet row or
/// CSV line, or the 1-based array position for JSON.
type Numbered = Vec<(usize, RawRow)>;

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub format: FileFormat,
    /// Non-empty source columns in order; for JSON the keys in order of first
    /// appearance.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Source row number of each entry in `rows`. Blank rows are dropped from
    /// `rows` but still counted here.
    pub numbers: Vec<usize>,
}

impl ParsedFile {
    /// Number shown to the user for the row at `index` (0-based).
    pub fn row_number(&self, index: usize) -> usize {
        self.numbers
            .get(index)
            .copied()
            .unwrap_or(index + 1 + usize::from(self.format.has_header()))
    }
}

pub fn parse_file(path: &Path) -> Result<ParsedFile, ParseError> {
    let format = FileFormat::from_path(path)?;
    let bytes = std::fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    parse_bytes(&bytes, format)
}

pub fn parse_bytes(bytes: &[u8], format: FileFormat) -> Result<ParsedFile, ParseError> {
    let (headers, rows) = match format {
        FileFormat::Json => parse_json(bytes)?,
        FileFormat::Csv => parse_csv(bytes)?,
        FileFormat::Xlsx | FileFormat::Xls => parse_spreadsheet(bytes)?,
    };
    let (numbers, rows): (Vec<usize>, Vec<RawRow>) =
        rows.into_iter().filter(|(_, r)| !r.is_blank()).unzip();
    if rows.is_empty() {
        return Err(ParseError::NoDataRows);
    }
    Ok(ParsedFile {
        format,
        headers,
        rows,
        numbers,
    })
}

fn parse_json(bytes: &[u8]) -> Result<(Vec<String>, Numbered), ParseError> {
    let doc: serde_json::Value = serde_json::from_slice(bytes)?;
    let items = match doc {
        serde_json::Value::Array(items) => items,
        other => vec![other],
    };
    let mut headers: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let obj = item.as_object().ok_or(ParseError::NotObject(i))?;
        for k in obj.keys() {
            if !headers.iter().any(|h| h == k) {
                headers.push(k.clone());
            }
        }
        rows.push((i + 1, RawRow::from_json_object(obj)));
    }
    Ok((headers, rows))
}

fn parse_csv(bytes: &[u8]) -> Result<(Vec<String>, Numbered), ParseError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ParseError::Encoding)?;
    let text = text.trim_start_matches('\u{feff}');
    if text.lines().filter(|l| !l.trim().is_empty()).count() < 2 {
        return Err(ParseError::TooFewLines);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 2);
        let mut row = RawRow::new();
        for (c, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let cell = match record.get(c) {
                Some(v) if !v.is_empty() => Cell::Text(v.to_string()),
                _ => Cell::Empty,
            };
            row.push(header.clone(), cell);
        }
        rows.push((line, row));
    }
    Ok((non_empty(headers), rows))
}

fn non_empty(headers: Vec<String>) -> Vec<String> {
    headers.into_iter().filter(|h| !h.is_empty()).collect()
}

fn parse_spreadsheet(bytes: &[u8]) -> Result<(Vec<String>, Numbered), ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoSheets)?;
    let range = workbook.worksheet_range(&first)?;

    // The range starts at the first used row, not necessarily row 1.
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let mut lines = range.rows();
    let Some(header_line) = lines.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers: Vec<String> = header_line
        .iter()
        .map(|c| cell_from_data(c).display().trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let mut row = RawRow::new();
        for (c, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let cell = line.get(c).map(cell_from_data).unwrap_or(Cell::Empty);
            row.push(header.clone(), cell);
        }
        // 1-based sheet row; the header sits at `first_row`.
        rows.push((first_row + i + 2, row));
    }
    Ok((non_empty(headers), rows))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(_) => Cell::Empty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_requires_header_and_data_line() {
        let err = parse_bytes(b"Institution Code *\n\n", FileFormat::Csv).unwrap_err();
        assert!(matches!(err, ParseError::TooFewLines));
    }

    #[test]
    fn csv_handles_quoted_commas_and_trims() {
        let src = "Institution Code *,Remarks\n JKKN ,\"late, then present\"\n,\n";
        let parsed = parse_bytes(src.as_bytes(), FileFormat::Csv).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(
            parsed.rows[0].get("Institution Code *"),
            Some(&Cell::Text("JKKN".into()))
        );
        assert_eq!(
            parsed.rows[0].get("Remarks"),
            Some(&Cell::Text("late, then present".into()))
        );
    }

    #[test]
    fn json_single_object_is_one_row() {
        let parsed = parse_bytes(br#"{"grade":"O","grade_point":10}"#, FileFormat::Json).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.headers, vec!["grade", "grade_point"]);
        assert_eq!(parsed.rows[0].get("grade_point"), Some(&Cell::Number(10.0)));
    }

    #[test]
    fn malformed_json_is_fatal() {
        let err = parse_bytes(b"[{\"grade\": ", FileFormat::Json).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = FileFormat::from_extension("txt").unwrap_err();
        assert_eq!(err.to_string(), "Unsupported file type: txt");
    }

    #[test]
    fn row_numbers_account_for_header_line() {
        let csv = parse_bytes(b"Grade\nO\nA\n", FileFormat::Csv).unwrap();
        assert_eq!(csv.row_number(0), 2);
        assert_eq!(csv.row_number(1), 3);
        let json = parse_bytes(br#"[{"grade":"O"}]"#, FileFormat::Json).unwrap();
        assert_eq!(json.row_number(0), 1);
    }

    #[test]
    fn blank_rows_still_count_toward_row_numbers() {
        let src = "Grade,Grade Point\nO,10\n,\n\nA,9\n";
        let parsed = parse_bytes(src.as_bytes(), FileFormat::Csv).unwrap();
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.numbers, vec![2, 5]);

        let json = parse_bytes(br#"[{"grade":"O"},{"grade":" "},{"grade":"A"}]"#, FileFormat::Json)
            .unwrap();
        assert_eq!(json.numbers, vec![1, 3]);
    }

    fn sheet_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn spreadsheet_drops_unlabelled_columns_and_numbers_sheet_rows() {
        let bytes = sheet_bytes(&[
            &["Grade *", "", "Grade Point *"],
            &["O", "stray", "10"],
            &["", "", ""],
            &["A", "", "9"],
        ]);
        let parsed = parse_bytes(&bytes, FileFormat::Xlsx).unwrap();
        assert_eq!(parsed.headers, vec!["Grade *", "Grade Point *"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].get("Grade Point *"), Some(&Cell::Text("10".into())));
        assert_eq!(parsed.numbers, vec![2, 4]);
    }

    #[test]
    fn csv_drops_unlabelled_columns() {
        let parsed = parse_bytes(b"Grade,,Remarks\nO,x,ok\n", FileFormat::Csv).unwrap();
        assert_eq!(parsed.headers, vec!["Grade", "Remarks"]);
    }
}
