// crates/fieldscope-core/src/core/filter.rs
// ============================================================================
// Module: Fieldscope Record Filters
// Description: Inclusive date-range filter and extra categorical/search filters.
// Purpose: Produce the working set the aggregation engine accumulates over.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Date ranges compare calendar dates only: a timestamp is truncated to its
//! own calendar date, the start bound to the start of its day, and the end
//! bound to the end of its day, so anything recorded on the end date is
//! included. Unparsable timestamps are never in range.
//!
//! ## Invariants
//! - A record whose timestamp fell back to "now" is excluded by any bounded
//!   range and included only when both bounds are absent.
//! - Selecting the `Unknown` category matches records missing the field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::Date;

use crate::core::records::CategoryField;
use crate::core::records::EntityRecord;
use crate::core::records::UNKNOWN_LABEL;
use crate::core::time::ResolvedTimestamp;
use crate::core::time::parse_timestamp;
use crate::core::time::parse_timestamp_str;

// ============================================================================
// SECTION: Date Range
// ============================================================================

/// Inclusive calendar date range; absent bounds are unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    /// First included date.
    pub start: Option<Date>,
    /// Last included date.
    pub end: Option<Date>,
}

impl DateRange {
    /// Creates a range from optional bounds.
    #[must_use]
    pub const fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self {
            start,
            end,
        }
    }

    /// Returns the fully unbounded range.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::new(None, None)
    }

    /// Returns true when at least one bound is set.
    #[must_use]
    pub const fn is_bounded(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Returns true when `date` lies within the range.
    #[must_use]
    pub fn contains_date(&self, date: Date) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }

    /// Returns true when a resolved record timestamp lies within the range.
    #[must_use]
    pub fn contains(&self, timestamp: &ResolvedTimestamp) -> bool {
        if !self.is_bounded() {
            return true;
        }
        timestamp.is_stored() && self.contains_date(timestamp.date())
    }
}

/// Returns true when a stored timestamp string lies within the inclusive range.
///
/// Comparison uses the timestamp's own calendar date. Unparsable input is
/// never in range.
#[must_use]
pub fn in_range(timestamp: &str, start: Option<Date>, end: Option<Date>) -> bool {
    parse_timestamp_str(timestamp)
        .is_some_and(|value| DateRange::new(start, end).contains_date(value.date()))
}

/// Returns true when a stored JSON timestamp lies within the inclusive range.
#[must_use]
pub fn value_in_range(timestamp: &Value, start: Option<Date>, end: Option<Date>) -> bool {
    parse_timestamp(timestamp)
        .is_some_and(|value| DateRange::new(start, end).contains_date(value.date()))
}

// ============================================================================
// SECTION: Extra Filters
// ============================================================================

/// Exact match on one categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    /// Field to compare.
    pub field: CategoryField,
    /// Selected value; `Unknown` selects records missing the field.
    pub value: String,
}

impl CategoryFilter {
    /// Creates a category filter.
    #[must_use]
    pub fn new(field: CategoryField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Returns true when `record` matches the selected value.
    #[must_use]
    pub fn matches<R: EntityRecord>(&self, record: &R) -> bool {
        let observed = record.category(self.field).map(str::trim).filter(|value| !value.is_empty());
        match observed {
            Some(value) => value == self.value,
            None => self.value == UNKNOWN_LABEL,
        }
    }
}

/// Optional filters applied before the date range.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtraFilters {
    /// Categorical equality filter.
    pub category: Option<CategoryFilter>,
    /// Case-insensitive substring searched across the record's search fields.
    pub search: Option<String>,
}

impl ExtraFilters {
    /// Returns true when `record` passes every configured filter.
    #[must_use]
    pub fn matches<R: EntityRecord>(&self, record: &R) -> bool {
        if let Some(category) = &self.category
            && !category.matches(record)
        {
            return false;
        }
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|text| !text.is_empty())
        else {
            return true;
        };
        let needle = needle.to_lowercase();
        record.search_fields().iter().any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Applies extra filters and the date range, preserving input order.
#[must_use]
pub fn working_set<'a, R: EntityRecord>(
    records: &'a [R],
    range: &DateRange,
    filters: &ExtraFilters,
) -> Vec<&'a R> {
    records
        .iter()
        .filter(|record| filters.matches(*record) && range.contains(&record.meta().recorded_at))
        .collect()
}
