use chrono::{Datelike, Month, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::PipelineError;

/// `<3 letters><anything but digits><exactly 4 digits>` at the start of a file name.
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3})\D*?(\d{4})(?:\D|$)").expect("month/year pattern is valid")
});

/// A calendar month of a given year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetMonth {
    pub year: i32,
    pub month: Month,
}

impl TargetMonth {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month.number_from_month(), 1)
    }

    /// Every date of the month, first to last inclusive.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let Some(first) = self.first_day() else {
            return Vec::new();
        };
        first
            .iter_days()
            .take_while(|d| d.month() == first.month())
            .collect()
    }
}

/// Fast lookup of a lowercase month abbreviation.
fn month_from_abbrev(abbrev: &str) -> Option<Month> {
    let m = match abbrev.to_ascii_lowercase().as_str() {
        "jan" => Month::January,
        "feb" => Month::February,
        "mar" => Month::March,
        "apr" => Month::April,
        "may" => Month::May,
        "jun" => Month::June,
        "jul" => Month::July,
        "aug" => Month::August,
        "sep" => Month::September,
        "oct" => Month::October,
        "nov" => Month::November,
        "dec" => Month::December,
        _ => return None,
    };
    Some(m)
}

/// Parse the target month out of names like `"Apr 2017 - MRV Lottery Results.csv"`
/// or `"Dec2019-lottery.csv"`.
pub fn extract_month_year(file_name: &str) -> Result<TargetMonth, PipelineError> {
    let unrecognized = || PipelineError::UnrecognizedDateFormat(file_name.to_string());

    let caps = MONTH_YEAR.captures(file_name).ok_or_else(unrecognized)?;
    let month = month_from_abbrev(&caps[1]).ok_or_else(unrecognized)?;
    let year: i32 = caps[2].parse().map_err(|_| unrecognized())?;

    Ok(TargetMonth::new(year, month))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spaced_name() {
        let t = extract_month_year("Jul 2019 foo bar").unwrap();
        assert_eq!(t, TargetMonth::new(2019, Month::July));
    }

    #[test]
    fn parses_run_together_names() {
        assert_eq!(
            extract_month_year("Dec2019-lottery.csv").unwrap(),
            TargetMonth::new(2019, Month::December)
        );
        assert_eq!(
            extract_month_year("December2019foobar").unwrap(),
            TargetMonth::new(2019, Month::December)
        );
        assert_eq!(
            extract_month_year("apr 2017 - MRV Lottery Results.csv").unwrap(),
            TargetMonth::new(2017, Month::April)
        );
        assert_eq!(
            extract_month_year("Jan 2020").unwrap(),
            TargetMonth::new(2020, Month::January)
        );
    }

    #[test]
    fn rejects_unknown_month_or_short_year() {
        for name in [
            "FooBar",
            "Foo 2019.csv",
            "Jul 19.csv",
            "Jul 20195 - x.csv",
            "2019 Jul.csv",
            "",
        ] {
            let err = extract_month_year(name).unwrap_err();
            assert!(
                matches!(err, PipelineError::UnrecognizedDateFormat(ref n) if n == name),
                "{name:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn month_lengths() {
        let len = |y, m| TargetMonth::new(y, m).dates().len();
        assert_eq!(len(2019, Month::July), 31);
        assert_eq!(len(2019, Month::April), 30);
        assert_eq!(len(2019, Month::February), 28);
        assert_eq!(len(2020, Month::February), 29);
        assert_eq!(len(1900, Month::February), 28);
        assert_eq!(len(2000, Month::February), 29);
    }

    #[test]
    fn dates_run_first_to_last() {
        let dates = TargetMonth::new(2019, Month::December).dates();
        assert_eq!(dates.first().unwrap().to_string(), "2019-12-01");
        assert_eq!(dates.last().unwrap().to_string(), "2019-12-31");
    }
}
