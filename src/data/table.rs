use std::fmt;

// ---------------------------------------------------------------------------
// Row – one parsed record of a prediction result CSV
// ---------------------------------------------------------------------------

/// Number of rows retained for interactive display. The full result stays
/// reachable through the unparsed download link.
pub const DISPLAY_WINDOW: usize = 20;

/// Column name carrying the predicted value in result CSVs.
const PREDICTION_COLUMN: &str = "prediction";

/// One record of the result table: ordered `(column, value)` pairs, including
/// the prediction column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub fields: Vec<(String, String)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    /// Whether a column name is the prediction column, regardless of casing.
    pub fn is_prediction_column(name: &str) -> bool {
        name.eq_ignore_ascii_case(PREDICTION_COLUMN)
    }

    /// The raw prediction value, matched case-insensitively.
    pub fn prediction(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| Self::is_prediction_column(name))
            .map(|(_, value)| value.as_str())
    }

    /// The prediction value coerced to a number.
    pub fn prediction_value(&self) -> Option<f64> {
        self.prediction().and_then(|raw| raw.trim().parse().ok())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}

/// Parsed prediction result: header order plus all data rows. Windowing to
/// [`DISPLAY_WINDOW`] is the display layer's concern, not the parser's.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTable {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse a prediction result CSV into rows, positionally against the header.
///
/// Pure and deterministic: identical input yields identical output. Quoting
/// follows RFC 4180, so a quoted value may contain literal commas (the naive
/// split this replaces could not). Whitespace around tokens is trimmed,
/// blank lines are skipped, and short records are padded with empty values.
/// Malformed or empty input yields an empty table rather than an error.
pub fn parse_prediction_csv(text: &str) -> ResultTable {
    let text = text.trim_start_matches('\u{feff}');
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(headers) => headers.iter().map(|h| h.to_string()).collect(),
        Err(err) => {
            log::warn!("Result CSV has no readable header: {err}");
            return ResultTable::default();
        }
    };
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return ResultTable::default();
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::warn!("Skipping malformed result CSV record: {err}");
                continue;
            }
        };
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(Row { fields });
    }

    ResultTable { headers, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(table: &ResultTable, row: usize) -> Vec<&str> {
        table.rows[row]
            .fields
            .iter()
            .map(|(_, v)| v.as_str())
            .collect()
    }

    #[test]
    fn parses_header_and_rows_in_order() {
        let table = parse_prediction_csv("a,b\n1,2\n3,4\n");
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("a"), Some("1"));
        assert_eq!(table.rows[0].get("b"), Some("2"));
        assert_eq!(values(&table, 1), vec!["3", "4"]);
    }

    #[test]
    fn trims_whitespace_and_drops_blank_lines() {
        let table = parse_prediction_csv(" a , b \n 1 , 2 \n\n\n");
        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("a"), Some("1"));
    }

    #[test]
    fn quoted_comma_stays_one_value() {
        let table = parse_prediction_csv("name,prediction\n\"Doe, Jane\",0.8\n");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].get("name"), Some("Doe, Jane"));
        assert_eq!(table.rows[0].get("prediction"), Some("0.8"));
    }

    #[test]
    fn short_records_pad_positionally() {
        let table = parse_prediction_csv("a,b,c\n1,2\n");
        assert_eq!(values(&table, 0), vec!["1", "2", ""]);
    }

    #[test]
    fn empty_or_non_tabular_input_yields_empty_table() {
        assert!(parse_prediction_csv("").rows.is_empty());
        assert!(parse_prediction_csv("\n\n").rows.is_empty());
        assert!(parse_prediction_csv("just one line").rows.is_empty());
    }

    #[test]
    fn identical_input_parses_identically() {
        let text = "a,b\n1,2\n3,4\n";
        assert_eq!(parse_prediction_csv(text), parse_prediction_csv(text));
    }

    #[test]
    fn prediction_lookup_is_case_insensitive() {
        let table = parse_prediction_csv("a,Prediction\n1,0.8\n");
        assert_eq!(table.rows[0].prediction(), Some("0.8"));
        assert_eq!(table.rows[0].prediction_value(), Some(0.8));
    }
}
