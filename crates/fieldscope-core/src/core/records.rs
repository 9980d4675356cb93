// crates/fieldscope-core/src/core/records.rs
// ============================================================================
// Module: Fieldscope Canonical Records
// Description: Canonical domain records produced by the normalizer.
// Purpose: Give every page one typed shape per entity regardless of storage era.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Five entity types flow through Fieldscope: farmers, training sessions,
//! offtake transactions, requisitions, and animal health activities. Each is a
//! plain struct carrying a [`RecordMeta`] header. The [`EntityRecord`] trait is
//! the seam the fetcher and aggregation engine work through: it exposes the
//! header, categorical lookups, searchable text, and per-record metrics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::identifiers::PartitionName;
use crate::core::identifiers::RecordId;
use crate::core::normalize;
use crate::core::time::ResolvedTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Label used for missing categorical values.
pub const UNKNOWN_LABEL: &str = "Unknown";

// ============================================================================
// SECTION: Shared Types
// ============================================================================

/// Entity type selector for normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Registered farmer.
    Farmer,
    /// Training session.
    TrainingSession,
    /// Livestock offtake transaction.
    OfftakeTransaction,
    /// Procurement requisition entry.
    RequisitionEntry,
    /// Animal health activity (vaccination, treatment, deworming).
    AnimalHealthActivity,
}

impl EntityKind {
    /// Returns a stable label for the entity kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::TrainingSession => "training_session",
            Self::OfftakeTransaction => "offtake_transaction",
            Self::RequisitionEntry => "requisition_entry",
            Self::AnimalHealthActivity => "animal_health_activity",
        }
    }
}

/// Normalized gender category.
///
/// # Invariants
/// - Values starting with `f` (any case) are `Female`; everything else,
///   including missing values, is `Male`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Gender {
    /// Male (also the default for unrecognized or missing values).
    Male,
    /// Female.
    Female,
}

impl Gender {
    /// Normalizes free text into a gender category.
    #[must_use]
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(text) if text.starts_with(['f', 'F']) => Self::Female,
            _ => Self::Male,
        }
    }

    /// Returns the display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
        }
    }
}

/// Categorical field selector for filters and breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryField {
    /// Programme partition tag.
    Programme,
    /// County (region).
    County,
    /// Subcounty.
    Subcounty,
    /// Location, village, or ward.
    Location,
    /// Normalized gender label.
    Gender,
    /// Entity-specific category (topic, animal kind, requisition type, activity).
    Category,
    /// Workflow status (requisitions).
    Status,
}

/// Header shared by all canonical records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMeta {
    /// Store-assigned record identifier.
    pub id: RecordId,
    /// Programme partition tag, when stored.
    pub programme: Option<PartitionName>,
    /// Timestamp used for range filtering and bucketing.
    pub recorded_at: ResolvedTimestamp,
}

/// Per-record numeric contributions consumed by the aggregation engine.
///
/// # Invariants
/// - All values are finite as produced by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RecordMetrics {
    /// Primary volume (herd size, attendees, animals sold, quantities, doses).
    pub volume: f64,
    /// Monetary amount recorded on the record.
    pub amount: f64,
    /// Sum of carcass weights across sub-records.
    pub carcass_weight: f64,
    /// Sum of live weights across sub-records.
    pub live_weight: f64,
    /// Number of sub-records (animals, line items).
    pub sub_records: u32,
    /// Recorded acquisition cost.
    pub acquisition_cost: f64,
    /// Male head count contributed by the record.
    pub male: u32,
    /// Female head count contributed by the record.
    pub female: u32,
    /// Whether the record carries the entity's positive flag (vaccinated,
    /// approved, vaccination activity).
    pub flagged: bool,
}

/// Seam between canonical records and the fetch/aggregation runtime.
pub trait EntityRecord: Clone + Send + Sync + 'static {
    /// Entity kind produced by [`EntityRecord::from_raw`].
    const KIND: EntityKind;

    /// Normalizes a raw stored record. Never fails.
    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self;

    /// Returns the shared record header.
    fn meta(&self) -> &RecordMeta;

    /// Returns the observed value of a categorical field.
    fn category(&self, field: CategoryField) -> Option<&str>;

    /// Returns the fixed list of fields matched by free-text search.
    fn search_fields(&self) -> Vec<&str>;

    /// Returns the record's numeric contributions.
    fn metrics(&self) -> RecordMetrics;

    /// Returns a display label for rankings.
    fn label(&self) -> &str;
}

/// Returns the programme tag as a category value.
fn programme_label(meta: &RecordMeta) -> Option<&str> {
    meta.programme.as_ref().map(PartitionName::as_str)
}

/// Collects present optional text fields.
fn present<'a>(fields: [Option<&'a str>; 4]) -> impl Iterator<Item = &'a str> {
    fields.into_iter().flatten()
}

// ============================================================================
// SECTION: Farmer
// ============================================================================

/// Registered farmer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Farmer {
    /// Record header.
    pub meta: RecordMeta,
    /// Farmer name.
    pub name: String,
    /// Normalized gender.
    pub gender: Gender,
    /// Phone number.
    pub phone: String,
    /// National identity number.
    pub id_number: String,
    /// County.
    pub county: Option<String>,
    /// Subcounty.
    pub subcounty: Option<String>,
    /// Location or village.
    pub location: Option<String>,
    /// Cattle owned.
    pub cattle: u32,
    /// Goats owned.
    pub goats: u32,
    /// Sheep owned.
    pub sheep: u32,
    /// Whether the herd is recorded as vaccinated.
    pub vaccinated: bool,
}

impl Farmer {
    /// Returns the total herd size.
    #[must_use]
    pub fn herd_size(&self) -> u64 {
        u64::from(self.cattle) + u64::from(self.goats) + u64::from(self.sheep)
    }
}

impl EntityRecord for Farmer {
    const KIND: EntityKind = EntityKind::Farmer;

    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self {
        normalize::farmer(id, raw, now)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Programme => programme_label(&self.meta),
            CategoryField::County => self.county.as_deref(),
            CategoryField::Subcounty => self.subcounty.as_deref(),
            CategoryField::Location => self.location.as_deref(),
            CategoryField::Gender => Some(self.gender.label()),
            CategoryField::Category | CategoryField::Status => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.phone.as_str(), self.id_number.as_str()];
        fields.extend(present([
            self.county.as_deref(),
            self.subcounty.as_deref(),
            self.location.as_deref(),
            None,
        ]));
        fields
    }

    fn metrics(&self) -> RecordMetrics {
        let (male, female) = match self.gender {
            Gender::Male => (1, 0),
            Gender::Female => (0, 1),
        };
        RecordMetrics {
            volume: f64::from(self.cattle) + f64::from(self.goats) + f64::from(self.sheep),
            male,
            female,
            flagged: self.vaccinated,
            ..RecordMetrics::default()
        }
    }

    fn label(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// SECTION: Training Session
// ============================================================================

/// Farmer training session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSession {
    /// Record header.
    pub meta: RecordMeta,
    /// Training topic or module.
    pub topic: Option<String>,
    /// Trainer or facilitator.
    pub trainer: String,
    /// County.
    pub county: Option<String>,
    /// Subcounty.
    pub subcounty: Option<String>,
    /// Venue location.
    pub location: Option<String>,
    /// Total attendees.
    pub attendees: u32,
    /// Male attendees.
    pub male_attendees: u32,
    /// Female attendees.
    pub female_attendees: u32,
}

impl EntityRecord for TrainingSession {
    const KIND: EntityKind = EntityKind::TrainingSession;

    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self {
        normalize::training_session(id, raw, now)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Programme => programme_label(&self.meta),
            CategoryField::County => self.county.as_deref(),
            CategoryField::Subcounty => self.subcounty.as_deref(),
            CategoryField::Location => self.location.as_deref(),
            CategoryField::Category => self.topic.as_deref(),
            CategoryField::Gender | CategoryField::Status => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.trainer.as_str()];
        fields.extend(present([
            self.topic.as_deref(),
            self.county.as_deref(),
            self.subcounty.as_deref(),
            self.location.as_deref(),
        ]));
        fields
    }

    fn metrics(&self) -> RecordMetrics {
        RecordMetrics {
            volume: f64::from(self.attendees),
            male: self.male_attendees,
            female: self.female_attendees,
            ..RecordMetrics::default()
        }
    }

    fn label(&self) -> &str {
        self.topic.as_deref().unwrap_or(&self.trainer)
    }
}

// ============================================================================
// SECTION: Offtake Transaction
// ============================================================================

/// Per-animal entry on an offtake transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimalEntry {
    /// Species or animal kind.
    pub kind: Option<String>,
    /// Live weight in kilograms.
    pub live_weight: f64,
    /// Carcass weight in kilograms.
    pub carcass_weight: f64,
    /// Price paid to the farmer.
    pub price: f64,
}

/// Livestock purchase from a farmer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfftakeTransaction {
    /// Record header.
    pub meta: RecordMeta,
    /// Selling farmer's name.
    pub farmer_name: String,
    /// Selling farmer's normalized gender.
    pub farmer_gender: Gender,
    /// Selling farmer's phone number.
    pub phone: String,
    /// County.
    pub county: Option<String>,
    /// Subcounty.
    pub subcounty: Option<String>,
    /// Market or location.
    pub location: Option<String>,
    /// Animals purchased.
    pub animals: Vec<AnimalEntry>,
    /// Recorded total price.
    pub total_price: f64,
}

impl OfftakeTransaction {
    /// Returns the recorded acquisition cost.
    ///
    /// The stored total wins when present; otherwise the per-animal prices are
    /// summed.
    #[must_use]
    pub fn acquisition_cost(&self) -> f64 {
        if self.total_price > 0.0 {
            return self.total_price;
        }
        self.animals.iter().map(|animal| animal.price).sum()
    }

    /// Returns the summed carcass weight.
    #[must_use]
    pub fn carcass_weight(&self) -> f64 {
        self.animals.iter().map(|animal| animal.carcass_weight).sum()
    }
}

impl EntityRecord for OfftakeTransaction {
    const KIND: EntityKind = EntityKind::OfftakeTransaction;

    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self {
        normalize::offtake_transaction(id, raw, now)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Programme => programme_label(&self.meta),
            CategoryField::County => self.county.as_deref(),
            CategoryField::Subcounty => self.subcounty.as_deref(),
            CategoryField::Location => self.location.as_deref(),
            CategoryField::Gender => Some(self.farmer_gender.label()),
            CategoryField::Category => {
                self.animals.iter().find_map(|animal| animal.kind.as_deref())
            }
            CategoryField::Status => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.farmer_name.as_str(), self.phone.as_str()];
        fields.extend(present([
            self.county.as_deref(),
            self.subcounty.as_deref(),
            self.location.as_deref(),
            None,
        ]));
        fields
    }

    fn metrics(&self) -> RecordMetrics {
        let (male, female) = match self.farmer_gender {
            Gender::Male => (1, 0),
            Gender::Female => (0, 1),
        };
        let sub_records = u32::try_from(self.animals.len()).unwrap_or(u32::MAX);
        RecordMetrics {
            volume: f64::from(sub_records),
            amount: self.total_price,
            carcass_weight: self.carcass_weight(),
            live_weight: self.animals.iter().map(|animal| animal.live_weight).sum(),
            sub_records,
            acquisition_cost: self.acquisition_cost(),
            male,
            female,
            flagged: false,
        }
    }

    fn label(&self) -> &str {
        &self.farmer_name
    }
}

// ============================================================================
// SECTION: Requisition Entry
// ============================================================================

/// Line item on a requisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostItem {
    /// Item description.
    pub description: Option<String>,
    /// Quantity requested.
    pub quantity: f64,
    /// Unit cost.
    pub unit_cost: f64,
    /// Line total (stored, or quantity × unit cost when absent).
    pub total: f64,
}

/// Procurement requisition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequisitionEntry {
    /// Record header.
    pub meta: RecordMeta,
    /// Requesting staff member.
    pub requester: String,
    /// Requisition type (fuel, travel, supplies, ...).
    pub requisition_type: Option<String>,
    /// Workflow status.
    pub status: Option<String>,
    /// County.
    pub county: Option<String>,
    /// Subcounty.
    pub subcounty: Option<String>,
    /// Line items.
    pub items: Vec<CostItem>,
    /// Recorded total amount (stored, or summed line totals when absent).
    pub total_amount: f64,
}

impl EntityRecord for RequisitionEntry {
    const KIND: EntityKind = EntityKind::RequisitionEntry;

    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self {
        normalize::requisition_entry(id, raw, now)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Programme => programme_label(&self.meta),
            CategoryField::County => self.county.as_deref(),
            CategoryField::Subcounty => self.subcounty.as_deref(),
            CategoryField::Category => self.requisition_type.as_deref(),
            CategoryField::Status => self.status.as_deref(),
            CategoryField::Location | CategoryField::Gender => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.requester.as_str()];
        fields.extend(present([
            self.requisition_type.as_deref(),
            self.status.as_deref(),
            self.county.as_deref(),
            self.subcounty.as_deref(),
        ]));
        fields
    }

    fn metrics(&self) -> RecordMetrics {
        let approved = self
            .status
            .as_deref()
            .is_some_and(|status| status.trim().to_ascii_lowercase().starts_with("approved"));
        RecordMetrics {
            volume: self.items.iter().map(|item| item.quantity).sum(),
            amount: self.total_amount,
            sub_records: u32::try_from(self.items.len()).unwrap_or(u32::MAX),
            flagged: approved,
            ..RecordMetrics::default()
        }
    }

    fn label(&self) -> &str {
        &self.requester
    }
}

// ============================================================================
// SECTION: Animal Health Activity
// ============================================================================

/// Animal health activity (vaccination, treatment, deworming).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimalHealthActivity {
    /// Record header.
    pub meta: RecordMeta,
    /// Activity type.
    pub activity: Option<String>,
    /// Vaccine or drug administered.
    pub vaccine: Option<String>,
    /// Responsible officer.
    pub officer: String,
    /// County.
    pub county: Option<String>,
    /// Subcounty.
    pub subcounty: Option<String>,
    /// Location.
    pub location: Option<String>,
    /// Doses administered.
    pub doses: u32,
    /// Animals treated.
    pub animals_treated: u32,
}

impl EntityRecord for AnimalHealthActivity {
    const KIND: EntityKind = EntityKind::AnimalHealthActivity;

    fn from_raw(id: RecordId, raw: &Value, now: OffsetDateTime) -> Self {
        normalize::animal_health_activity(id, raw, now)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn category(&self, field: CategoryField) -> Option<&str> {
        match field {
            CategoryField::Programme => programme_label(&self.meta),
            CategoryField::County => self.county.as_deref(),
            CategoryField::Subcounty => self.subcounty.as_deref(),
            CategoryField::Location => self.location.as_deref(),
            CategoryField::Category => self.activity.as_deref(),
            CategoryField::Gender | CategoryField::Status => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.officer.as_str()];
        fields.extend(present([
            self.activity.as_deref(),
            self.vaccine.as_deref(),
            self.county.as_deref(),
            self.location.as_deref(),
        ]));
        fields
    }

    fn metrics(&self) -> RecordMetrics {
        let vaccination = self
            .activity
            .as_deref()
            .is_some_and(|activity| activity.to_ascii_lowercase().contains("vaccin"));
        RecordMetrics {
            volume: f64::from(self.doses),
            sub_records: self.animals_treated,
            flagged: vaccination,
            ..RecordMetrics::default()
        }
    }

    fn label(&self) -> &str {
        self.activity.as_deref().unwrap_or(&self.officer)
    }
}

// ============================================================================
// SECTION: Canonical Record
// ============================================================================

/// Any canonical record, selected at runtime by [`EntityKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum CanonicalRecord {
    /// Farmer record.
    Farmer(Farmer),
    /// Training session record.
    TrainingSession(TrainingSession),
    /// Offtake transaction record.
    OfftakeTransaction(OfftakeTransaction),
    /// Requisition record.
    RequisitionEntry(RequisitionEntry),
    /// Animal health activity record.
    AnimalHealthActivity(AnimalHealthActivity),
}

impl CanonicalRecord {
    /// Returns the entity kind of the record.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Farmer(_) => EntityKind::Farmer,
            Self::TrainingSession(_) => EntityKind::TrainingSession,
            Self::OfftakeTransaction(_) => EntityKind::OfftakeTransaction,
            Self::RequisitionEntry(_) => EntityKind::RequisitionEntry,
            Self::AnimalHealthActivity(_) => EntityKind::AnimalHealthActivity,
        }
    }

    /// Returns the shared record header.
    #[must_use]
    pub const fn meta(&self) -> &RecordMeta {
        match self {
            Self::Farmer(record) => &record.meta,
            Self::TrainingSession(record) => &record.meta,
            Self::OfftakeTransaction(record) => &record.meta,
            Self::RequisitionEntry(record) => &record.meta,
            Self::AnimalHealthActivity(record) => &record.meta,
        }
    }
}
