// Source readers: first worksheet of a workbook, or a delimited text file,
// flattened to rows of trimmed strings.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};

/// Data lines sampled when sniffing a CSV delimiter.
const SNIFF_ROWS: usize = 20;

/// One physical row. `row_number` is the 1-based sheet (or line) number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub row_number: u32,
    pub cells: Vec<String>,
}

impl TableRow {
    /// Trimmed cell at `idx`, `None` when absent or blank.
    pub fn cell(&self, idx: usize) -> Option<&str> {
        self.cells
            .get(idx)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// Header row plus data rows of a single sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// First row of the used range; `None` for an empty sheet.
    pub header: Option<TableRow>,
    pub rows: Vec<TableRow>,
}

/// Read a source file. `.csv` goes through the delimited reader, anything
/// else through calamine.
pub fn read_table(path: &Path) -> Result<Table, String> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        read_csv(path)
    } else {
        read_workbook(path)
    }
}

// ---------------------------------------------------------------------------
// Workbooks
// ---------------------------------------------------------------------------

fn read_workbook(path: &Path) -> Result<Table, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;

    // Only the first worksheet is ever read.
    let first = match workbook.sheet_names().first() {
        Some(name) => name.clone(),
        None => return Ok(Table::default()),
    };
    let range = workbook.worksheet_range(&first).map_err(|e| e.to_string())?;
    Ok(table_from_range(&range))
}

fn table_from_range(range: &Range<Data>) -> Table {
    if range.is_empty() {
        return Table::default();
    }

    // Used range may not begin at A1; keep real sheet row numbers.
    let (start_row, _) = range.start().unwrap_or((0, 0));
    let mut rows = range.rows().enumerate().map(|(idx, row)| TableRow {
        row_number: start_row + idx as u32 + 1,
        cells: row.iter().map(cell_to_string).collect(),
    });

    let header = rows.next();
    Table {
        header,
        rows: rows.collect(),
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => {
                naive.format("%Y-%m-%d").to_string()
            }
            Some(naive) => naive.format("%Y-%m-%dT%H:%M:%S").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) => s.trim().to_string(),
        Data::DurationIso(s) => s.trim().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Delimited text
// ---------------------------------------------------------------------------

fn read_csv(path: &Path) -> Result<Table, String> {
    let content = read_file_as_utf8(path)?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut header = None;
    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| e.to_string())?;
        let (row_number, start) = match record.position() {
            Some(p) => (p.line() as u32, p.byte() as usize),
            None => (idx as u32 + 1, 0),
        };
        let row = TableRow {
            row_number,
            cells: record.iter().map(|f| f.trim().to_string()).collect(),
        };
        if header.is_none() {
            header = Some(row);
            continue;
        }

        // The csv reader skips empty lines; they come back as blank rows so
        // validation sees them the way it sees empty workbook rows.
        let skipped = blank_lines_before(content.as_bytes(), start);
        for line in row_number.saturating_sub(skipped)..row_number {
            rows.push(TableRow {
                row_number: line,
                cells: Vec::new(),
            });
        }
        rows.push(row);
    }

    Ok(Table { header, rows })
}

/// Empty lines directly before byte `start`, not counting the terminator
/// of the previous record.
fn blank_lines_before(content: &[u8], start: usize) -> u32 {
    let mut terminators = 0u32;
    let mut at = start.min(content.len());
    while at > 0 {
        match content[at - 1] {
            b'\n' => {
                at -= 1;
                if at > 0 && content[at - 1] == b'\r' {
                    at -= 1;
                }
            }
            b'\r' => at -= 1,
            _ => break,
        }
        terminators += 1;
    }
    terminators.saturating_sub(1)
}

/// Number of fields `line` splits into under `delimiter`.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map_or(1, |r| r.len())
}

/// Delimiter under which the most data lines match the header's field
/// count. The header must split into at least two columns; a wider header
/// wins a tie, then comma.
fn sniff_delimiter(content: &str) -> u8 {
    const CANDIDATES: [u8; 4] = [b'|', b'\t', b';', b','];
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let Some(header) = lines.next() else {
        return b',';
    };
    let sample: Vec<&str> = lines.take(SNIFF_ROWS).collect();

    CANDIDATES
        .into_iter()
        .filter_map(|delim| {
            let width = field_count(header, delim);
            (width > 1).then(|| {
                let matching = sample
                    .iter()
                    .filter(|line| field_count(line, delim) == width)
                    .count();
                (matching, width, delim)
            })
        })
        .max_by_key(|&(matching, width, _)| (matching, width))
        .map_or(b',', |(_, _, delim)| delim)
}

/// UTF-8 if it decodes, Windows-1252 otherwise (Excel-exported CSVs).
fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn sniff_prefers_consistent_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a,b\n1,2\n"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn sniff_anchors_on_the_header() {
        // Semicolons inside descriptions do not outvote the comma header.
        assert_eq!(sniff_delimiter("item,descrip\nA1,Chart; north\nA2,Chart; south\n"), b',');
        // Leading blank lines are not the header.
        assert_eq!(sniff_delimiter("\n\nshipid|item\nV1|A1\n"), b'|');
        assert_eq!(sniff_delimiter("shipid;item\n"), b';');
    }

    #[test]
    fn csv_blank_lines_become_blank_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("onboard.csv");
        std::fs::write(&path, "shipid,item\nV1,A1\n\n\nV1,A2\n\n").unwrap();

        let table = read_table(&path).unwrap();
        let numbers: Vec<u32> = table.rows.iter().map(|r| r.row_number).collect();
        assert_eq!(numbers, vec![2, 3, 4, 5]);
        assert!(table.rows[1].is_blank());
        assert!(table.rows[2].is_blank());
        assert_eq!(table.rows[3].cell(1), Some("A2"));
    }

    #[test]
    fn quoted_line_breaks_are_not_blank_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.csv");
        std::fs::write(&path, "item,descrip\nA1,\"Chart\n\n\"\nA2,Plain\n").unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].row_number, 5);
        assert_eq!(table.rows[1].cell(0), Some("A2"));
    }

    #[test]
    fn csv_rows_are_trimmed_and_numbered() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        std::fs::write(&path, "\u{feff}ShipID, ShipName \nV1 , Aurora\n\nV2,Borealis\n").unwrap();

        let table = read_table(&path).unwrap();
        let header = table.header.unwrap();
        assert_eq!(header.row_number, 1);
        assert_eq!(header.cells, vec!["ShipID", "ShipName"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].row_number, 2);
        assert_eq!(table.rows[0].cell(0), Some("V1"));
        assert!(table.rows[1].is_blank());
        assert_eq!(table.rows[2].row_number, 4);
    }

    #[test]
    fn csv_latin1_falls_back_to_windows_1252() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.csv");
        std::fs::write(&path, b"item,description\nA1,Caf\xe9 chart\n").unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.rows[0].cell(1), Some("Café chart"));
    }

    #[test]
    fn empty_csv_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        let table = read_table(&path).unwrap();
        assert!(table.header.is_none());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn workbook_reads_first_sheet_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.xlsx");

        let mut workbook = Workbook::new();
        let first = workbook.add_worksheet();
        first.write_string(0, 0, "ITEM").unwrap();
        first.write_string(0, 1, "Edition").unwrap();
        first.write_string(1, 0, " A1 ").unwrap();
        first.write_number(1, 1, 3.0).unwrap();
        first.write_boolean(2, 0, true).unwrap();
        first.write_number(2, 1, 2.5).unwrap();
        let second = workbook.add_worksheet();
        second.write_string(0, 0, "ignored").unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.header.unwrap().cells, vec!["ITEM", "Edition"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells, vec!["A1", "3"]);
        assert_eq!(table.rows[1].cells, vec!["TRUE", "2.5"]);
        assert_eq!(table.rows[1].row_number, 3);
    }

    #[test]
    fn workbook_offset_range_keeps_sheet_row_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 0, "item").unwrap();
        sheet.write_string(3, 0, "A1").unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.header.unwrap().row_number, 3);
        assert_eq!(table.rows[0].row_number, 4);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();
        assert!(read_table(&path).is_err());
    }
}
