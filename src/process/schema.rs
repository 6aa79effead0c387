use crate::error::PipelineError;
use crate::process::csv_reader::RawRecord;

/// Column holding the vendor's name.
pub const VENDOR_COLUMN: &str = "Business Name";

/// Weekday columns every schedule file must carry.
pub const WEEKDAY_COLUMNS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];

/// Check the first row carries the vendor column and Monday–Friday.
/// Later rows are not inspected.
pub fn validate_columns(records: Vec<RawRecord>) -> Result<Vec<RawRecord>, PipelineError> {
    let required = std::iter::once(VENDOR_COLUMN).chain(WEEKDAY_COLUMNS);

    let missing: Vec<String> = match records.first() {
        Some(first) => required
            .filter(|col| !first.contains_key(*col))
            .map(str::to_string)
            .collect(),
        None => required.map(str::to_string).collect(),
    };

    if missing.is_empty() {
        Ok(records)
    } else {
        Err(PipelineError::SchemaMismatch { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn full_row() -> RawRecord {
        row(&[
            ("Business Name", "foo"),
            ("Monday", "foo"),
            ("Tuesday", "foo"),
            ("Wednesday", "foo"),
            ("Thursday", "foo"),
            ("Friday", "foo"),
        ])
    }

    #[test]
    fn accepts_expected_columns() {
        let recs = validate_columns(vec![full_row()]).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn rejects_unrelated_columns() {
        let recs = vec![
            row(&[("a", "1"), ("b", "2"), ("c", "3")]),
            row(&[("a", "4"), ("b", "5"), ("c", "6")]),
        ];
        match validate_columns(recs).unwrap_err() {
            PipelineError::SchemaMismatch { missing } => assert_eq!(missing.len(), 6),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn each_required_column_is_needed() {
        for col in std::iter::once(VENDOR_COLUMN).chain(WEEKDAY_COLUMNS) {
            let mut r = full_row();
            r.remove(col);
            match validate_columns(vec![r]).unwrap_err() {
                PipelineError::SchemaMismatch { missing } => assert_eq!(missing, vec![col]),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn column_names_are_case_sensitive() {
        let mut r = full_row();
        let v = r.remove("Monday").unwrap();
        r.insert("monday".into(), v);
        assert!(validate_columns(vec![r]).is_err());
    }

    #[test]
    fn only_first_row_is_checked() {
        let recs = vec![full_row(), row(&[("x", "y")])];
        assert_eq!(validate_columns(recs).unwrap().len(), 2);
    }

    #[test]
    fn empty_input_is_a_mismatch() {
        assert!(matches!(
            validate_columns(Vec::new()),
            Err(PipelineError::SchemaMismatch { .. })
        ));
    }
}
