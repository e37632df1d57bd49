use chrono::Weekday;

use super::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn every_day_of(year: i32) -> impl Iterator<Item = NaiveDate> {
    date(year, 1, 1)
        .iter_days()
        .take_while(move |d| d.year() == year)
}

#[test]
fn weekly_monday_run_covers_previous_week_across_year_boundary() {
    let windows = PeriodWindows::weekly(date(2026, 1, 5));
    assert_eq!(windows.report.start(), date(2025, 12, 29));
    assert_eq!(windows.report.end(), date(2026, 1, 4));
    assert_eq!(windows.comparison.start(), date(2025, 12, 22));
    assert_eq!(windows.comparison.end(), date(2025, 12, 28));
}

#[test]
fn weekly_sunday_run_still_skips_current_week() {
    // Sunday 2026-01-11 belongs to the week starting 2026-01-05.
    let windows = PeriodWindows::weekly(date(2026, 1, 11));
    assert_eq!(windows.report.start(), date(2025, 12, 29));
    assert_eq!(windows.report.end(), date(2026, 1, 4));
}

#[test]
fn weekly_windows_are_monday_to_sunday_before_today() {
    for today in every_day_of(2024).chain(every_day_of(2026)) {
        let windows = PeriodWindows::weekly(today);
        assert_eq!(windows.report.start().weekday(), Weekday::Mon, "{today}");
        assert_eq!(windows.report.end().weekday(), Weekday::Sun, "{today}");
        assert_eq!(
            windows.report.end() - windows.report.start(),
            Duration::days(6)
        );
        assert!(windows.report.end() < today, "{today}");
        assert!(today - windows.report.end() <= Duration::days(7), "{today}");
    }
}

#[test]
fn weekly_comparison_is_adjacent_and_equal_length() {
    for today in every_day_of(2025) {
        let windows = PeriodWindows::weekly(today);
        assert_eq!(windows.comparison.len_days(), windows.report.len_days());
        assert_eq!(
            windows.comparison.end(),
            windows.report.start() - Duration::days(1)
        );
    }
}

#[test]
fn monthly_february_run_reports_january() {
    for day in 1..=28 {
        let windows = PeriodWindows::monthly(date(2026, 2, day));
        assert_eq!(windows.report.start(), date(2026, 1, 1));
        assert_eq!(windows.report.end(), date(2026, 1, 31));
        assert_eq!(windows.comparison.start(), date(2025, 12, 1));
        assert_eq!(windows.comparison.end(), date(2025, 12, 31));
    }
}

#[test]
fn monthly_january_run_rolls_back_a_year() {
    let windows = PeriodWindows::monthly(date(2026, 1, 15));
    assert_eq!(windows.report.start(), date(2025, 12, 1));
    assert_eq!(windows.report.end(), date(2025, 12, 31));
    assert_eq!(windows.comparison.start(), date(2025, 11, 1));
    assert_eq!(windows.comparison.end(), date(2025, 11, 30));
}

#[test]
fn monthly_handles_leap_february() {
    let windows = PeriodWindows::monthly(date(2024, 3, 1));
    assert_eq!(windows.report.start(), date(2024, 2, 1));
    assert_eq!(windows.report.end(), date(2024, 2, 29));
    assert_eq!(windows.report.len_days(), 29);
    assert_eq!(windows.comparison.len_days(), 31);
}

#[test]
fn monthly_comparison_always_ends_day_before_report() {
    for today in every_day_of(2025).chain(every_day_of(2028)) {
        let windows = PeriodWindows::monthly(today);
        assert_eq!(windows.report.start().day(), 1);
        assert_eq!(windows.comparison.start().day(), 1);
        assert_eq!(
            windows.comparison.end(),
            windows.report.start() - Duration::days(1)
        );
        assert_eq!(
            (windows.report.end() + Duration::days(1)).month(),
            today.month()
        );
    }
}

#[test]
fn for_cadence_dispatches_to_strategy() {
    let today = date(2026, 3, 4);
    assert_eq!(
        PeriodWindows::for_cadence(Cadence::Weekly, today),
        PeriodWindows::weekly(today)
    );
    assert_eq!(
        PeriodWindows::for_cadence(Cadence::Monthly, today),
        PeriodWindows::monthly(today)
    );
}

#[test]
fn report_window_rejects_inverted_bounds() {
    assert!(ReportWindow::new(date(2026, 1, 2), date(2026, 1, 1)).is_none());
    let single = ReportWindow::new(date(2026, 1, 1), date(2026, 1, 1)).unwrap();
    assert_eq!(single.len_days(), 1);
}

#[test]
fn report_window_display_uses_iso_bounds() {
    let windows = PeriodWindows::weekly(date(2026, 1, 5));
    assert_eq!(windows.report.to_string(), "2025-12-29 to 2026-01-04");
}

#[test]
fn sheet_date_key_has_no_zero_padding() {
    assert_eq!(sheet_date_key(date(2026, 1, 5)), "5/1/2026");
    assert_eq!(sheet_date_key(date(2025, 12, 29)), "29/12/2025");
}

#[test]
fn sheet_date_keys_parse_back() {
    assert_eq!(parse_sheet_date_key("5/1/2026"), Some(date(2026, 1, 5)));
    assert_eq!(parse_sheet_date_key(" 05/01/2026 "), Some(date(2026, 1, 5)));
    assert_eq!(parse_sheet_date_key("Date"), None);
    assert_eq!(parse_sheet_date_key("31/2/2026"), None);
    assert_eq!(parse_sheet_date_key("1/2/2026/1"), None);
}

#[test]
fn window_contains_both_bounds() {
    let report = PeriodWindows::monthly(date(2026, 2, 3)).report;
    assert!(report.contains(date(2026, 1, 1)));
    assert!(report.contains(date(2026, 1, 31)));
    assert!(!report.contains(date(2026, 2, 1)));
    assert!(!report.contains(date(2025, 12, 31)));
}

#[test]
fn cadence_parses_case_insensitively() {
    assert_eq!("Weekly".parse::<Cadence>().unwrap(), Cadence::Weekly);
    assert_eq!(" monthly ".parse::<Cadence>().unwrap(), Cadence::Monthly);
    assert!("daily".parse::<Cadence>().is_err());
}
