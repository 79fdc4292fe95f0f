//! Usage accounting types.
//!
//! This module contains types related to usage tracking:
//! - [`UsageRecord`] - Counters for one `(date, provider)` bucket
//! - [`UsageTotals`] - Counters summed over any set of buckets
//! - [`DateRange`] - Inclusive query range
//! - [`UsageSummary`] - Aggregated query answer

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// Usage Record
// ============================================================================

/// Counters for one provider on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    /// Calendar day (UTC).
    pub date: NaiveDate,
    /// Provider identifier.
    pub provider_id: String,
    /// Requests whose outcome this provider produced.
    pub request_count: u64,
    /// `tokens_in + tokens_out`.
    pub token_count: u64,
    /// Prompt tokens.
    #[serde(default)]
    pub tokens_in: u64,
    /// Completion tokens.
    #[serde(default)]
    pub tokens_out: u64,
    /// Requests that ended in failure.
    #[serde(default)]
    pub error_count: u64,
}

impl UsageRecord {
    /// Creates an empty record.
    pub fn new(date: NaiveDate, provider_id: impl Into<String>) -> Self {
        Self {
            date,
            provider_id: provider_id.into(),
            request_count: 0,
            token_count: 0,
            tokens_in: 0,
            tokens_out: 0,
            error_count: 0,
        }
    }

    /// Returns the counters of this record as totals.
    pub fn totals(&self) -> UsageTotals {
        UsageTotals {
            request_count: self.request_count,
            token_count: self.token_count,
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            error_count: self.error_count,
        }
    }
}

// ============================================================================
// Usage Totals
// ============================================================================

/// Counters summed over several records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
    /// Requests.
    pub request_count: u64,
    /// Prompt plus completion tokens.
    pub token_count: u64,
    /// Prompt tokens.
    pub tokens_in: u64,
    /// Completion tokens.
    pub tokens_out: u64,
    /// Failed requests.
    pub error_count: u64,
}

impl UsageTotals {
    /// Adds another set of totals into this one.
    pub fn add(&mut self, other: &UsageTotals) {
        self.request_count = self.request_count.saturating_add(other.request_count);
        self.token_count = self.token_count.saturating_add(other.token_count);
        self.tokens_in = self.tokens_in.saturating_add(other.tokens_in);
        self.tokens_out = self.tokens_out.saturating_add(other.tokens_out);
        self.error_count = self.error_count.saturating_add(other.error_count);
    }
}

// ============================================================================
// Date Range
// ============================================================================

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day.
    pub from: NaiveDate,
    /// Last day.
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates a range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::validation(format!(
                "range start {from} is after range end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// A range covering exactly one day.
    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    /// The `days` days ending on `end`, inclusive. `days == 0` is treated as 1.
    pub fn last_days(end: NaiveDate, days: u64) -> Self {
        let span = days.saturating_sub(1);
        let from = end.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);
        Self { from, to: end }
    }

    /// Builds a range from optional bounds.
    ///
    /// A missing end is `today`; a missing start gives the `days` days
    /// ending at the end.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if an explicit start is after the end.
    pub fn from_bounds(
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        today: NaiveDate,
        days: u64,
    ) -> Result<Self, CoreError> {
        let to = to.unwrap_or(today);
        match from {
            Some(from) => Self::new(from, to),
            None => Ok(Self::last_days(to, days)),
        }
    }

    /// Returns true if `day` falls inside the range.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

// ============================================================================
// Usage Summary
// ============================================================================

/// Aggregated answer to a usage query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    /// First day covered.
    pub from: NaiveDate,
    /// Last day covered.
    pub to: NaiveDate,
    /// Provider filter, if one was applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Totals over every matching record.
    pub totals: UsageTotals,
    /// Totals per provider.
    pub providers: BTreeMap<String, UsageTotals>,
    /// Matching records ordered by date, then provider.
    pub days: Vec<UsageRecord>,
}

impl UsageSummary {
    /// Aggregates `records` that fall in `range` (and match `provider`, if given).
    pub fn aggregate<'a, I>(range: DateRange, provider: Option<&str>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a UsageRecord>,
    {
        let mut days: Vec<UsageRecord> = records
            .into_iter()
            .filter(|r| range.contains(r.date))
            .filter(|r| provider.is_none_or(|p| r.provider_id == p))
            .cloned()
            .collect();
        days.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.provider_id.cmp(&b.provider_id))
        });

        let mut totals = UsageTotals::default();
        let mut providers: BTreeMap<String, UsageTotals> = BTreeMap::new();
        for record in &days {
            let t = record.totals();
            totals.add(&t);
            providers.entry(record.provider_id.clone()).or_default().add(&t);
        }

        Self {
            from: range.from,
            to: range.to,
            provider: provider.map(ToString::to_string),
            totals,
            providers,
            days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn record(d: u32, provider: &str, requests: u64, tokens: u64) -> UsageRecord {
        UsageRecord {
            request_count: requests,
            token_count: tokens,
            tokens_in: tokens / 2,
            tokens_out: tokens - tokens / 2,
            ..UsageRecord::new(day(d), provider)
        }
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(DateRange::new(day(5), day(4)).is_err());
        assert!(DateRange::new(day(4), day(4)).is_ok());
    }

    #[test]
    fn test_last_days_inclusive() {
        let range = DateRange::last_days(day(10), 7);
        assert_eq!(range.from, day(4));
        assert!(range.contains(day(4)));
        assert!(range.contains(day(10)));
        assert!(!range.contains(day(3)));
        assert_eq!(DateRange::last_days(day(10), 0), DateRange::single(day(10)));
    }

    #[test]
    fn test_from_bounds() {
        let today = day(20);

        let open = DateRange::from_bounds(None, None, today, 7).unwrap();
        assert_eq!((open.from, open.to), (day(14), today));

        let ending = DateRange::from_bounds(None, Some(day(10)), today, 3).unwrap();
        assert_eq!((ending.from, ending.to), (day(8), day(10)));

        let starting = DateRange::from_bounds(Some(day(1)), None, today, 7).unwrap();
        assert_eq!((starting.from, starting.to), (day(1), today));

        assert!(DateRange::from_bounds(Some(day(21)), None, today, 7).is_err());
    }

    #[test]
    fn test_aggregate_filters_and_sums() {
        let records = vec![
            record(1, "openai", 2, 100),
            record(2, "openai", 1, 10),
            record(2, "groq", 5, 50),
            record(9, "openai", 7, 70),
        ];
        let range = DateRange::new(day(1), day(3)).unwrap();

        let all = UsageSummary::aggregate(range, None, &records);
        assert_eq!(all.totals.request_count, 8);
        assert_eq!(all.totals.token_count, 160);
        assert_eq!(all.providers["openai"].request_count, 3);
        assert_eq!(all.days.len(), 3);
        assert_eq!(all.days[1].provider_id, "groq");

        let openai = UsageSummary::aggregate(range, Some("openai"), &records);
        assert_eq!(openai.totals.request_count, 3);
        assert!(!openai.providers.contains_key("groq"));
    }
}
