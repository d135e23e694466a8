// CSV text -> RawTable.
//
// Exports are read with flexible record lengths: survey tools sometimes drop
// trailing empty cells, and those read back as empty through RawTable::cell.

use super::error::ImportError;
use super::types::RawTable;

pub fn read_csv(text: &str) -> Result<RawTable, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    if headers.is_empty() {
        return Err(ImportError::Empty);
    }

    Ok(RawTable::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_keeps_rows_in_order() {
        let text = "ResponseId,Q1\nResponse ID,Colour?\n{\"ImportId\":\"_recordId\"},{\"ImportId\":\"QID1\"}\nR1,Red\nR2,Blue\n";
        let table = read_csv(text).unwrap();
        assert_eq!(table.headers, vec!["ResponseId", "Q1"]);
        assert_eq!(table.rows.len(), 4);
        // rows hold everything below the header line
        assert_eq!(table.cell(0, 1), "Colour?");
        assert_eq!(table.cell(1, 0), "{\"ImportId\":\"_recordId\"}");
        assert_eq!(table.cell(2, 1), "Red");
        assert_eq!(table.cell(3, 1), "Blue");
    }

    #[test]
    fn test_read_csv_strips_bom_and_tolerates_short_records() {
        let text = "\u{feff}ResponseId,Q1,Q2\na,b,c\nR1\n";
        let table = read_csv(text).unwrap();
        assert_eq!(table.headers[0], "ResponseId");
        assert_eq!(table.cell(1, 0), "R1");
        assert_eq!(table.cell(1, 2), "");
    }

    #[test]
    fn test_read_csv_quoted_commas() {
        let text = "ResponseId,Q1\nx,\"Colour, please\"\n";
        let table = read_csv(text).unwrap();
        assert_eq!(table.cell(0, 1), "Colour, please");
    }
}
