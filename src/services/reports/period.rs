use chrono::{DateTime, Duration, Months, NaiveDate, NaiveTime, Utc};

use crate::{
    error::{AppError, AppResult},
    models::DateRange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    /// Unknown or missing tokens mean the last 30 days.
    pub fn parse(token: Option<&str>) -> Self {
        match token.map(str::trim).unwrap_or_default().to_ascii_lowercase().as_str() {
            "7j" | "7d" => Self::Week,
            "30j" | "30d" => Self::Month,
            "90j" | "90d" => Self::Quarter,
            "1a" | "1y" | "12m" => Self::Year,
            _ => Self::Month,
        }
    }

    pub fn start_before(self, to: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Week => to - Duration::days(7),
            Self::Month => to - Duration::days(30),
            Self::Quarter => to - Duration::days(90),
            Self::Year => to
                .checked_sub_months(Months::new(12))
                .unwrap_or_else(|| to - Duration::days(365)),
        }
    }
}

/// Explicit bounds win when both are given; otherwise the period counts back
/// from `now`. `from <= to` is not checked.
pub fn resolve_range(
    period: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<DateRange> {
    let start = start_date.map(str::trim).filter(|value| !value.is_empty());
    let end = end_date.map(str::trim).filter(|value| !value.is_empty());

    if let (Some(start), Some(end)) = (start, end) {
        return Ok(DateRange {
            from: parse_bound(start, start_of_day())?,
            to: parse_bound(end, end_of_day())?,
        });
    }

    Ok(DateRange {
        from: Period::parse(period).start_before(now),
        to: now,
    })
}

fn parse_bound(raw: &str, date_only_time: NaiveTime) -> AppResult<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_time(date_only_time).and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|_| AppError::BadRequest(format!("Invalid ISO date '{raw}'.")))
}

fn start_of_day() -> NaiveTime {
    NaiveTime::default()
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default()
}
