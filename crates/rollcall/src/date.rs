use chrono::{Datelike, Days, NaiveDate};

/// Returns the Sunday on or before `date`.
///
/// Check-in reports group occurrences by the week they fall in; this is the
/// canonical anchor for that week. Dates in the first partial week of the
/// representable range clamp to [`NaiveDate::MIN`].
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use rollcall::week_anchor;
///
/// let wednesday = NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
/// assert_eq!(week_anchor(wednesday), NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
/// ```
pub fn week_anchor(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(back))
        .unwrap_or(NaiveDate::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sunday_anchors_to_itself() {
        assert_eq!(week_anchor(ymd(2025, 1, 5)), ymd(2025, 1, 5));
    }

    #[test]
    fn saturday_anchors_to_previous_sunday() {
        assert_eq!(week_anchor(ymd(2025, 1, 11)), ymd(2025, 1, 5));
    }

    #[test]
    fn crosses_month_and_year_boundaries() {
        // Thursday 2025-01-02 belongs to the week of Sunday 2024-12-29.
        assert_eq!(week_anchor(ymd(2025, 1, 2)), ymd(2024, 12, 29));
        // Leap day 2024 was a Thursday.
        assert_eq!(week_anchor(ymd(2024, 2, 29)), ymd(2024, 2, 25));
    }

    #[test]
    fn every_day_of_a_week_shares_one_anchor() {
        let sunday = ymd(2025, 6, 1);
        for offset in 0..7 {
            let day = sunday + Days::new(offset);
            let anchor = week_anchor(day);
            assert_eq!(anchor, sunday, "{day}");
            assert_eq!(anchor.weekday(), Weekday::Sun);
        }
        assert_eq!(week_anchor(sunday + Days::new(7)), ymd(2025, 6, 8));
    }

    #[test]
    fn clamps_at_the_start_of_the_calendar() {
        assert!(week_anchor(NaiveDate::MIN) <= NaiveDate::MIN + Days::new(6));
        assert!(week_anchor(NaiveDate::MIN) >= NaiveDate::MIN);
    }
}
