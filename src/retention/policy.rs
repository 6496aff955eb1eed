//! Expiration policy.
//!
//! A visit expires once the inactive period configured on its case type, for
//! its visit type, has fully elapsed since the visit date. The policy is pure:
//! it never touches storage, and `now` is always supplied by the caller.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use validator::Validate;

use super::RetentionError;
use crate::models::{CaseType, VisitType};

/// Outcome of evaluating one visit against its case's retention periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub expired: bool,
    pub expires_on: NaiveDate,
}

/// Add whole calendar years to a date.
///
/// 29 February rolls over to 1 March when the target year is not a leap year.
/// Returns `None` only when the result is outside chrono's date range.
pub fn add_years(date: NaiveDate, years: i32) -> Option<NaiveDate> {
    let year = date.year().checked_add(years)?;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 3, 1))
}

/// Last expiration date included by a batch look-ahead window starting today.
pub fn lookahead_cutoff(today: NaiveDate, months: u32) -> Option<NaiveDate> {
    today.checked_add_months(Months::new(months))
}

/// Decide whether a visit has expired at `now`.
///
/// The visit expires on `visit_date + inactive period`; it counts as expired
/// only once `now` is strictly after midnight UTC of that day.
pub fn evaluate(
    case: &CaseType,
    visit_type: &str,
    visit_date: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Decision, RetentionError> {
    let visit_type: VisitType = visit_type
        .parse()
        .map_err(|_| RetentionError::InvalidVisitType(visit_type.to_string()))?;

    case.periods
        .validate()
        .map_err(|e| RetentionError::InvalidCase {
            case_id: case.id,
            reason: e.to_string(),
        })?;

    let years = case.periods.inactive_years(visit_type);
    let expires_on = add_years(visit_date, years).ok_or_else(|| RetentionError::InvalidCase {
        case_id: case.id,
        reason: format!("{} years after {} is out of range", years, visit_date),
    })?;

    let threshold = expires_on.and_time(NaiveTime::MIN).and_utc();
    Ok(Decision {
        expired: now > threshold,
        expires_on,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::models::RetentionPeriods;

    fn case(inactive_inpatient: i32, inactive_outpatient: i32) -> CaseType {
        CaseType {
            id: 1,
            name: "General".to_string(),
            periods: RetentionPeriods {
                active_inpatient_years: 5,
                inactive_inpatient_years: inactive_inpatient,
                active_outpatient_years: 5,
                inactive_outpatient_years: inactive_outpatient,
            },
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[rstest]
    #[case::past_threshold("inpatient", date(2022, 1, 1), date(2024, 1, 1), true)]
    #[case::before_threshold("inpatient", date(2023, 6, 1), date(2025, 6, 1), false)]
    #[case::outpatient_period("outpatient", date(2021, 3, 15), date(2026, 3, 15), false)]
    #[case::outpatient_expired("outpatient", date(2018, 3, 15), date(2023, 3, 15), true)]
    fn test_evaluate_against_mid_2024(
        #[case] visit_type: &str,
        #[case] visit_date: NaiveDate,
        #[case] expires_on: NaiveDate,
        #[case] expired: bool,
    ) {
        let decision = evaluate(&case(2, 5), visit_type, visit_date, at(2024, 6, 1, 0, 0, 0)).unwrap();
        assert_eq!(decision.expires_on, expires_on);
        assert_eq!(decision.expired, expired);
    }

    #[test]
    fn test_threshold_is_strictly_after_midnight() {
        let c = case(2, 2);
        let visit_date = date(2022, 1, 1);

        let at_midnight = evaluate(&c, "inpatient", visit_date, at(2024, 1, 1, 0, 0, 0)).unwrap();
        assert!(!at_midnight.expired);

        let one_second_later =
            evaluate(&c, "inpatient", visit_date, at(2024, 1, 1, 0, 0, 1)).unwrap();
        assert!(one_second_later.expired);
    }

    #[test]
    fn test_zero_period_expires_after_visit_day_starts() {
        let decision = evaluate(&case(0, 0), "outpatient", date(2024, 5, 1), at(2024, 5, 1, 9, 0, 0))
            .unwrap();
        assert_eq!(decision.expires_on, date(2024, 5, 1));
        assert!(decision.expired);
    }

    #[rstest]
    #[case::common_year(date(2020, 2, 29), 1, date(2021, 3, 1))]
    #[case::leap_year(date(2020, 2, 29), 4, date(2024, 2, 29))]
    #[case::plain(date(2019, 12, 31), 2, date(2021, 12, 31))]
    #[case::zero(date(2019, 7, 4), 0, date(2019, 7, 4))]
    fn test_add_years(#[case] from: NaiveDate, #[case] years: i32, #[case] expected: NaiveDate) {
        assert_eq!(add_years(from, years), Some(expected));
    }

    #[test]
    fn test_lookahead_cutoff_clamps_to_month_end() {
        assert_eq!(lookahead_cutoff(date(2024, 11, 30), 3), Some(date(2025, 2, 28)));
        assert_eq!(lookahead_cutoff(date(2024, 6, 1), 0), Some(date(2024, 6, 1)));
    }

    #[test]
    fn test_unknown_visit_type() {
        let err = evaluate(&case(2, 2), "emergency", date(2020, 1, 1), Utc::now()).unwrap_err();
        assert!(matches!(err, RetentionError::InvalidVisitType(ref t) if t == "emergency"));
    }

    #[test]
    fn test_negative_period_is_invalid_case() {
        let err = evaluate(&case(-1, 2), "inpatient", date(2020, 1, 1), Utc::now()).unwrap_err();
        assert!(matches!(err, RetentionError::InvalidCase { case_id: 1, .. }));
    }
}
