use chrono::{Months, NaiveDate};

/// add calendar months to a date, clamping to the last valid day of the
/// target month when the anchor day does not exist (e.g. Jan 31 + 1 month
/// = Feb 28/29)
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_plain_month_addition() {
        assert_eq!(add_months(d(2024, 1, 1), 1), d(2024, 2, 1));
        assert_eq!(add_months(d(2024, 1, 15), 11), d(2024, 12, 15));
    }

    #[test]
    fn test_year_rollover() {
        assert_eq!(add_months(d(2024, 12, 1), 1), d(2025, 1, 1));
        assert_eq!(add_months(d(2024, 6, 30), 18), d(2025, 12, 30));
    }

    #[test]
    fn test_month_end_clamping() {
        assert_eq!(add_months(d(2024, 1, 31), 1), d(2024, 2, 29)); // leap year
        assert_eq!(add_months(d(2023, 1, 31), 1), d(2023, 2, 28));
        assert_eq!(add_months(d(2024, 3, 31), 1), d(2024, 4, 30));
    }

    #[test]
    fn test_zero_months() {
        assert_eq!(add_months(d(2024, 5, 17), 0), d(2024, 5, 17));
    }
}
