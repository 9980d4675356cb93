// crates/fieldscope-core/src/core/stats.rs
// ============================================================================
// Module: Fieldscope Aggregation Engine
// Description: Single-pass statistics over filtered canonical records.
// Purpose: Derive totals, rates, pricing, trends, breakdowns, and rankings.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! [`aggregate`] filters the input into a working set, then walks it once,
//! feeding scalar accumulators, trend buckets, categorical breakdowns, and
//! ranking groups in the same loop. Derived values are computed afterwards
//! with zero-guarded division.
//!
//! ## Invariants
//! - Every numeric output is finite; division by zero yields zero.
//! - Trend series are fixed length, chronological, and zero-filled.
//! - Breakdowns always surface missing values under `Unknown`.
//! - Ranking ties keep first-seen order.
//!
//! Pricing is an explicit input so a record set can be re-priced without
//! fetching it again.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::util::weeks_in_year;

use crate::core::filter::DateRange;
use crate::core::filter::ExtraFilters;
use crate::core::filter::working_set;
use crate::core::records::CategoryField;
use crate::core::records::EntityRecord;
use crate::core::records::RecordMetrics;
use crate::core::records::UNKNOWN_LABEL;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Earliest accepted trend anchor year.
pub const MIN_ANCHOR_YEAR: i32 = 1900;
/// Latest accepted trend anchor year.
pub const MAX_ANCHOR_YEAR: i32 = 9000;
/// Default number of points in a yearly trend.
pub const DEFAULT_YEAR_SPAN: u16 = 5;
/// Maximum number of points in a yearly trend.
pub const MAX_YEAR_SPAN: u16 = 100;
/// Month labels in calendar order.
const MONTH_LABELS: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Externally configured pricing inputs.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price per priced unit (per kilogram of carcass weight).
    pub unit_price: f64,
    /// Operating expenses subtracted from revenue.
    pub operating_expenses: f64,
}

impl PricingConfig {
    /// Returns a copy with non-finite inputs replaced by zero.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self {
            unit_price: finite(self.unit_price),
            operating_expenses: finite(self.operating_expenses),
        }
    }
}

/// Quantity revenue is priced on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenueBasis {
    /// Summed sub-record carcass weights times the configured unit price.
    #[default]
    CarcassWeight,
    /// Stored record totals with an implicit unit price of 1.
    StoredTotal,
}

/// Calendar bucket size for trend series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGranularity {
    /// ISO weeks of the anchor ISO year.
    Week,
    /// Calendar months of the anchor year.
    Month,
    /// Calendar quarters of the anchor year.
    Quarter,
    /// Calendar years ending at the anchor year.
    Year,
}

/// Trend series request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendSpec {
    /// Bucket size.
    pub granularity: TrendGranularity,
    /// Year the series is anchored on (clamped to 1900..=9000).
    pub anchor_year: i32,
    /// Number of yearly points (year granularity only; clamped to 1..=100).
    #[serde(default = "default_year_span")]
    pub year_span: u16,
}

impl TrendSpec {
    /// Creates a trend request with the default year span.
    #[must_use]
    pub const fn new(granularity: TrendGranularity, anchor_year: i32) -> Self {
        Self {
            granularity,
            anchor_year,
            year_span: DEFAULT_YEAR_SPAN,
        }
    }
}

/// Serde default for [`TrendSpec::year_span`].
const fn default_year_span() -> u16 {
    DEFAULT_YEAR_SPAN
}

/// Numeric projection of a record's metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMetric {
    /// One per record.
    Count,
    /// Primary volume.
    Volume,
    /// Recorded monetary amount.
    Amount,
    /// Summed carcass weight.
    CarcassWeight,
    /// Summed live weight.
    LiveWeight,
    /// Sub-record count.
    SubRecords,
    /// Recorded acquisition cost.
    AcquisitionCost,
}

impl RecordMetric {
    /// Projects record metrics onto this metric.
    #[must_use]
    pub fn project(self, metrics: &RecordMetrics) -> f64 {
        match self {
            Self::Count => 1.0,
            Self::Volume => metrics.volume,
            Self::Amount => metrics.amount,
            Self::CarcassWeight => metrics.carcass_weight,
            Self::LiveWeight => metrics.live_weight,
            Self::SubRecords => f64::from(metrics.sub_records),
            Self::AcquisitionCost => metrics.acquisition_cost,
        }
    }
}

/// Categorical breakdown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownSpec {
    /// Field to group by.
    pub field: CategoryField,
    /// Metric summed per bucket and used for ordering.
    pub metric: RecordMetric,
}

/// Top-N ranking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingSpec {
    /// Metric ranked on.
    pub metric: RecordMetric,
    /// Maximum number of entries returned.
    pub limit: usize,
    /// Rank category groups instead of individual records when set.
    pub group_by: Option<CategoryField>,
}

/// Full aggregation request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Inclusive date range.
    #[serde(default)]
    pub range: DateRange,
    /// Category and search filters.
    #[serde(default)]
    pub filters: ExtraFilters,
    /// Pricing inputs.
    #[serde(default)]
    pub pricing: PricingConfig,
    /// Revenue basis.
    #[serde(default)]
    pub revenue_basis: RevenueBasis,
    /// Optional trend series.
    #[serde(default)]
    pub trend: Option<TrendSpec>,
    /// Categorical breakdowns, computed in request order.
    #[serde(default)]
    pub breakdowns: Vec<BreakdownSpec>,
    /// Optional top-N ranking.
    #[serde(default)]
    pub ranking: Option<RankingSpec>,
}

// ============================================================================
// SECTION: Result Types
// ============================================================================

/// Scalar totals, cardinalities, and derived rates.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScalarStats {
    /// Records in the working set.
    pub record_count: u64,
    /// Summed volume.
    pub total_volume: f64,
    /// Summed recorded amount.
    pub total_amount: f64,
    /// Summed carcass weight.
    pub total_carcass_weight: f64,
    /// Summed live weight.
    pub total_live_weight: f64,
    /// Summed sub-record count.
    pub total_sub_records: u64,
    /// Male head count.
    pub male: u64,
    /// Female head count.
    pub female: u64,
    /// Records carrying the entity flag.
    pub flagged: u64,
    /// Distinct programmes.
    pub unique_programmes: u64,
    /// Distinct counties.
    pub unique_counties: u64,
    /// Distinct subcounties.
    pub unique_subcounties: u64,
    /// Distinct locations.
    pub unique_locations: u64,
    /// Average volume per record.
    pub average_volume: f64,
    /// Average amount per record.
    pub average_amount: f64,
    /// Average carcass weight per sub-record.
    pub average_carcass_weight: f64,
    /// Male share of the gender split, in percent.
    pub male_pct: f64,
    /// Female share of the gender split, in percent.
    pub female_pct: f64,
    /// Share of flagged records, in percent.
    pub flagged_pct: f64,
}

/// Priced financial summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FinancialSummary {
    /// Effective unit price.
    pub unit_price: f64,
    /// Quantity priced (carcass weight or stored totals).
    pub priced_quantity: f64,
    /// Priced quantity times unit price.
    pub revenue: f64,
    /// Summed recorded acquisition cost.
    pub acquisition_cost: f64,
    /// Operating expenses.
    pub operating_expenses: f64,
    /// Revenue minus acquisition cost minus operating expenses.
    pub net_result: f64,
    /// Net result as a percentage of revenue.
    pub margin_pct: f64,
}

/// One point of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    /// Display label (`Jan`, `Q1`, `W01`, `2024`).
    pub label: String,
    /// Calendar (or ISO) year of the bucket.
    pub year: i32,
    /// One-based period within the year (month, quarter, week); 1 for years.
    pub period: u16,
    /// Records in the bucket.
    pub record_count: u64,
    /// Summed volume.
    pub volume: f64,
    /// Summed amount.
    pub amount: f64,
}

/// Fixed-length trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    /// Bucket size.
    pub granularity: TrendGranularity,
    /// Points in chronological order.
    pub points: Vec<TrendPoint>,
}

/// One bucket of a categorical breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBucket {
    /// Observed value, or `Unknown`.
    pub label: String,
    /// Records in the bucket.
    pub count: u64,
    /// Summed metric.
    pub sum: f64,
}

/// Categorical breakdown sorted by descending summed metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    /// Grouping field.
    pub field: CategoryField,
    /// Summed metric.
    pub metric: RecordMetric,
    /// Buckets, largest first.
    pub buckets: Vec<CategoryBucket>,
}

/// One ranked entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    /// Record label or group value.
    pub label: String,
    /// Ranked value.
    pub value: f64,
}

/// Complete aggregation output.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatisticsResult {
    /// Records supplied, before any filtering.
    pub input_count: u64,
    /// Scalar aggregates over the working set.
    pub scalars: ScalarStats,
    /// Financial summary over the working set.
    pub financial: FinancialSummary,
    /// Trend series, when requested.
    pub trend: Option<TrendSeries>,
    /// Breakdowns, in request order.
    pub breakdowns: Vec<CategoryBreakdown>,
    /// Top-N ranking, when requested.
    pub ranking: Vec<RankedEntry>,
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Computes statistics over `records` for `request`.
#[must_use]
pub fn aggregate<R: EntityRecord>(records: &[R], request: &AggregationRequest) -> StatisticsResult {
    let working = working_set(records, &request.range, &request.filters);
    let mut scalars = ScalarAccumulator::default();
    let mut trend = request.trend.map(TrendAccumulator::new);
    let mut breakdowns: Vec<BreakdownAccumulator> =
        request.breakdowns.iter().map(|spec| BreakdownAccumulator::new(*spec)).collect();
    let mut ranking = request.ranking.map(RankingAccumulator::new);

    for record in working {
        let metrics = record.metrics();
        scalars.add(record, &metrics);
        if let Some(trend) = trend.as_mut() {
            trend.add(record.meta().recorded_at.date(), &metrics);
        }
        for breakdown in &mut breakdowns {
            breakdown.add(record, &metrics);
        }
        if let Some(ranking) = ranking.as_mut() {
            ranking.add(record, &metrics);
        }
    }

    let financial = scalars.financial(request.pricing.sanitized(), request.revenue_basis);
    StatisticsResult {
        input_count: u64::try_from(records.len()).unwrap_or(u64::MAX),
        scalars: scalars.finish(),
        financial,
        trend: trend.map(TrendAccumulator::finish),
        breakdowns: breakdowns.into_iter().map(BreakdownAccumulator::finish).collect(),
        ranking: ranking.map(RankingAccumulator::finish).unwrap_or_default(),
    }
}

/// Computes statistics; alias of [`aggregate`] for UI-facing callers.
#[must_use]
pub fn compute_statistics<R: EntityRecord>(
    records: &[R],
    request: &AggregationRequest,
) -> StatisticsResult {
    aggregate(records, request)
}

/// Computes statistics with the top-N ranking taken from `projection`.
///
/// The projection is applied to the filtered working set only, so the
/// ranking honours the request's date range and extra filters. Any
/// `request.ranking` is superseded.
#[must_use]
pub fn aggregate_ranked<R, F>(
    records: &[R],
    request: &AggregationRequest,
    limit: usize,
    projection: F,
) -> StatisticsResult
where
    R: EntityRecord,
    F: Fn(&R) -> f64,
{
    let mut result = aggregate(records, request);
    let working = working_set(records, &request.range, &request.filters);
    result.ranking = rank_by(working, limit, projection);
    result
}

/// Ranks records by an arbitrary projection, descending, ties by input order.
///
/// Accepts a record slice or the output of [`working_set`].
#[must_use]
pub fn rank_by<'a, R, I, F>(records: I, limit: usize, projection: F) -> Vec<RankedEntry>
where
    R: EntityRecord,
    I: IntoIterator<Item = &'a R>,
    F: Fn(&R) -> f64,
{
    top_n(
        records.into_iter().map(|record| (record.label().to_string(), projection(record))),
        limit,
    )
}

/// Sorts labelled values descending, keeping first-seen order on ties.
#[must_use]
pub fn top_n<I>(entries: I, limit: usize) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut ranked: Vec<RankedEntry> = entries
        .into_iter()
        .map(|(label, value)| RankedEntry {
            label,
            value: finite(value),
        })
        .collect();
    ranked.sort_by(|left, right| right.value.total_cmp(&left.value));
    ranked.truncate(limit);
    ranked
}

/// Divides with a zero result for zero or non-finite denominators.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    finite(numerator / denominator)
}

/// Maps non-finite values to zero.
fn finite(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Converts a count into a float for rate computation.
#[allow(
    clippy::cast_precision_loss,
    reason = "Record counts stay far below 2^53."
)]
const fn count_f64(count: u64) -> f64 {
    count as f64
}

/// Returns a trimmed, non-empty category value.
fn category_value<R: EntityRecord>(record: &R, field: CategoryField) -> Option<&str> {
    record.category(field).map(str::trim).filter(|value| !value.is_empty())
}

// ============================================================================
// SECTION: Scalar Accumulator
// ============================================================================

/// Running scalar sums for the single pass.
#[derive(Debug, Default)]
struct ScalarAccumulator {
    /// Records seen.
    count: u64,
    /// Summed volume.
    volume: f64,
    /// Summed amount.
    amount: f64,
    /// Summed carcass weight.
    carcass_weight: f64,
    /// Summed live weight.
    live_weight: f64,
    /// Summed sub-records.
    sub_records: u64,
    /// Summed acquisition cost.
    acquisition_cost: f64,
    /// Male head count.
    male: u64,
    /// Female head count.
    female: u64,
    /// Flagged records.
    flagged: u64,
    /// Distinct programmes.
    programmes: BTreeSet<String>,
    /// Distinct counties.
    counties: BTreeSet<String>,
    /// Distinct subcounties.
    subcounties: BTreeSet<String>,
    /// Distinct locations.
    locations: BTreeSet<String>,
}

impl ScalarAccumulator {
    /// Adds one record.
    fn add<R: EntityRecord>(&mut self, record: &R, metrics: &RecordMetrics) {
        self.count += 1;
        self.volume += metrics.volume;
        self.amount += metrics.amount;
        self.carcass_weight += metrics.carcass_weight;
        self.live_weight += metrics.live_weight;
        self.sub_records += u64::from(metrics.sub_records);
        self.acquisition_cost += metrics.acquisition_cost;
        self.male += u64::from(metrics.male);
        self.female += u64::from(metrics.female);
        self.flagged += u64::from(metrics.flagged);
        let distinct = [
            (CategoryField::Programme, &mut self.programmes),
            (CategoryField::County, &mut self.counties),
            (CategoryField::Subcounty, &mut self.subcounties),
            (CategoryField::Location, &mut self.locations),
        ];
        for (field, set) in distinct {
            if let Some(value) = category_value(record, field)
                && !set.contains(value)
            {
                set.insert(value.to_string());
            }
        }
    }

    /// Derives the financial summary.
    fn financial(&self, pricing: PricingConfig, basis: RevenueBasis) -> FinancialSummary {
        let (priced_quantity, unit_price) = match basis {
            RevenueBasis::CarcassWeight => (finite(self.carcass_weight), pricing.unit_price),
            RevenueBasis::StoredTotal => (finite(self.amount), 1.0),
        };
        let revenue = finite(priced_quantity * unit_price);
        let acquisition_cost = finite(self.acquisition_cost);
        let net_result = finite(revenue - acquisition_cost - pricing.operating_expenses);
        FinancialSummary {
            unit_price,
            priced_quantity,
            revenue,
            acquisition_cost,
            operating_expenses: pricing.operating_expenses,
            net_result,
            margin_pct: ratio(net_result, revenue) * 100.0,
        }
    }

    /// Produces the scalar result.
    fn finish(self) -> ScalarStats {
        let count = count_f64(self.count);
        let split = count_f64(self.male + self.female);
        ScalarStats {
            record_count: self.count,
            total_volume: finite(self.volume),
            total_amount: finite(self.amount),
            total_carcass_weight: finite(self.carcass_weight),
            total_live_weight: finite(self.live_weight),
            total_sub_records: self.sub_records,
            male: self.male,
            female: self.female,
            flagged: self.flagged,
            unique_programmes: count_len(&self.programmes),
            unique_counties: count_len(&self.counties),
            unique_subcounties: count_len(&self.subcounties),
            unique_locations: count_len(&self.locations),
            average_volume: ratio(self.volume, count),
            average_amount: ratio(self.amount, count),
            average_carcass_weight: ratio(self.carcass_weight, count_f64(self.sub_records)),
            male_pct: ratio(count_f64(self.male), split) * 100.0,
            female_pct: ratio(count_f64(self.female), split) * 100.0,
            flagged_pct: ratio(count_f64(self.flagged), count) * 100.0,
        }
    }
}

/// Returns the cardinality of a distinct-value set.
fn count_len(set: &BTreeSet<String>) -> u64 {
    u64::try_from(set.len()).unwrap_or(u64::MAX)
}

// ============================================================================
// SECTION: Trend Accumulator
// ============================================================================

/// Zero-filled trend buckets for the single pass.
#[derive(Debug)]
struct TrendAccumulator {
    /// Bucket size.
    granularity: TrendGranularity,
    /// Clamped anchor year.
    anchor_year: i32,
    /// First year covered (year granularity).
    first_year: i32,
    /// Points in chronological order.
    points: Vec<TrendPoint>,
}

impl TrendAccumulator {
    /// Builds the empty, fixed-length series.
    fn new(spec: TrendSpec) -> Self {
        let anchor_year = spec.anchor_year.clamp(MIN_ANCHOR_YEAR, MAX_ANCHOR_YEAR);
        let span = spec.year_span.clamp(1, MAX_YEAR_SPAN);
        let first_year = anchor_year - i32::from(span) + 1;
        let points = match spec.granularity {
            TrendGranularity::Month => (1..=12u16)
                .zip(MONTH_LABELS)
                .map(|(period, label)| empty_point(label.to_string(), anchor_year, period))
                .collect(),
            TrendGranularity::Quarter => (1..=4u16)
                .map(|period| empty_point(format!("Q{period}"), anchor_year, period))
                .collect(),
            TrendGranularity::Week => (1..=u16::from(weeks_in_year(anchor_year)))
                .map(|period| empty_point(format!("W{period:02}"), anchor_year, period))
                .collect(),
            TrendGranularity::Year => (first_year..=anchor_year)
                .map(|year| empty_point(year.to_string(), year, 1))
                .collect(),
        };
        Self {
            granularity: spec.granularity,
            anchor_year,
            first_year,
            points,
        }
    }

    /// Returns the bucket index for a calendar date, if covered.
    fn index(&self, date: Date) -> Option<usize> {
        let index = match self.granularity {
            TrendGranularity::Month => {
                (date.year() == self.anchor_year).then(|| usize::from(u8::from(date.month())) - 1)
            }
            TrendGranularity::Quarter => (date.year() == self.anchor_year)
                .then(|| (usize::from(u8::from(date.month())) - 1) / 3),
            TrendGranularity::Week => {
                let (iso_year, week, _) = date.to_iso_week_date();
                (iso_year == self.anchor_year).then(|| usize::from(week) - 1)
            }
            TrendGranularity::Year => {
                let year = date.year();
                (self.first_year..=self.anchor_year)
                    .contains(&year)
                    .then(|| usize::try_from(year - self.first_year).ok())
                    .flatten()
            }
        };
        index.filter(|index| *index < self.points.len())
    }

    /// Adds one record dated `date`.
    fn add(&mut self, date: Date, metrics: &RecordMetrics) {
        if let Some(index) = self.index(date)
            && let Some(point) = self.points.get_mut(index)
        {
            point.record_count += 1;
            point.volume += metrics.volume;
            point.amount += metrics.amount;
        }
    }

    /// Produces the series.
    fn finish(self) -> TrendSeries {
        TrendSeries {
            granularity: self.granularity,
            points: self
                .points
                .into_iter()
                .map(|point| TrendPoint {
                    volume: finite(point.volume),
                    amount: finite(point.amount),
                    ..point
                })
                .collect(),
        }
    }
}

/// Builds a zero-filled trend point.
fn empty_point(label: String, year: i32, period: u16) -> TrendPoint {
    TrendPoint {
        label,
        year,
        period,
        record_count: 0,
        volume: 0.0,
        amount: 0.0,
    }
}

// ============================================================================
// SECTION: Breakdown Accumulator
// ============================================================================

/// Running buckets for one categorical breakdown.
#[derive(Debug)]
struct BreakdownAccumulator {
    /// Requested breakdown.
    spec: BreakdownSpec,
    /// Buckets in first-seen order.
    buckets: Vec<CategoryBucket>,
    /// Bucket index by label.
    index: HashMap<String, usize>,
}

impl BreakdownAccumulator {
    /// Creates an empty breakdown.
    fn new(spec: BreakdownSpec) -> Self {
        Self {
            spec,
            buckets: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds one record.
    fn add<R: EntityRecord>(&mut self, record: &R, metrics: &RecordMetrics) {
        let label = category_value(record, self.spec.field).unwrap_or(UNKNOWN_LABEL);
        let position = if let Some(position) = self.index.get(label) {
            *position
        } else {
            self.buckets.push(CategoryBucket {
                label: label.to_string(),
                count: 0,
                sum: 0.0,
            });
            let position = self.buckets.len() - 1;
            self.index.insert(label.to_string(), position);
            position
        };
        if let Some(bucket) = self.buckets.get_mut(position) {
            bucket.count += 1;
            bucket.sum += self.spec.metric.project(metrics);
        }
    }

    /// Produces the sorted breakdown.
    fn finish(self) -> CategoryBreakdown {
        let mut buckets: Vec<CategoryBucket> = self
            .buckets
            .into_iter()
            .map(|bucket| CategoryBucket {
                sum: finite(bucket.sum),
                ..bucket
            })
            .collect();
        buckets.sort_by(|left, right| {
            right.sum.total_cmp(&left.sum).then_with(|| right.count.cmp(&left.count))
        });
        CategoryBreakdown {
            field: self.spec.field,
            metric: self.spec.metric,
            buckets,
        }
    }
}

// ============================================================================
// SECTION: Ranking Accumulator
// ============================================================================

/// Running ranking input for the single pass.
#[derive(Debug)]
struct RankingAccumulator {
    /// Requested ranking.
    spec: RankingSpec,
    /// Labelled values in first-seen order.
    entries: Vec<(String, f64)>,
    /// Group index by label (grouped rankings only).
    groups: BTreeMap<String, usize>,
}

impl RankingAccumulator {
    /// Creates an empty ranking.
    const fn new(spec: RankingSpec) -> Self {
        Self {
            spec,
            entries: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Adds one record.
    fn add<R: EntityRecord>(&mut self, record: &R, metrics: &RecordMetrics) {
        let value = self.spec.metric.project(metrics);
        let Some(field) = self.spec.group_by else {
            self.entries.push((record.label().to_string(), value));
            return;
        };
        let label = category_value(record, field).unwrap_or(UNKNOWN_LABEL);
        if let Some(position) = self.groups.get(label).copied()
            && let Some(entry) = self.entries.get_mut(position)
        {
            entry.1 += value;
            return;
        }
        self.groups.insert(label.to_string(), self.entries.len());
        self.entries.push((label.to_string(), value));
    }

    /// Produces the ranking.
    fn finish(self) -> Vec<RankedEntry> {
        top_n(self.entries, self.spec.limit)
    }
}
