// crates/fieldscope-core/src/core/normalize.rs
// ============================================================================
// Module: Fieldscope Record Normalizer
// Description: Alias-driven mapping from raw stored records to canonical records.
// Purpose: Absorb years of renamed and legacy field spellings without failing.
// Dependencies: serde_json, time
// ============================================================================

//! ## Overview
//! Every canonical field has an ordered alias list; the first alias present
//! with a non-empty value wins. Numeric fields coerce to zero, nested lists
//! default to empty, and timestamps fall back to a caller-supplied "now".
//! Normalization is pure and never fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;
use time::OffsetDateTime;

use crate::core::identifiers::PartitionName;
use crate::core::identifiers::RecordId;
use crate::core::records::AnimalEntry;
use crate::core::records::AnimalHealthActivity;
use crate::core::records::CanonicalRecord;
use crate::core::records::CostItem;
use crate::core::records::EntityKind;
use crate::core::records::Farmer;
use crate::core::records::Gender;
use crate::core::records::OfftakeTransaction;
use crate::core::records::RecordMeta;
use crate::core::records::RequisitionEntry;
use crate::core::records::TrainingSession;
use crate::core::time::ResolvedTimestamp;
use crate::core::time::parse_timestamp;

// ============================================================================
// SECTION: Alias Tables
// ============================================================================

/// Programme partition tag.
const PROGRAMME: &[&str] = &["programme", "program", "Programme"];
/// County or region.
const COUNTY: &[&str] = &["county", "Region", "region", "County"];
/// Subcounty or district.
const SUBCOUNTY: &[&str] = &["subcounty", "subCounty", "Subcounty", "district"];
/// Location, village, or ward.
const LOCATION: &[&str] = &["location", "village", "ward", "Location"];
/// Phone number.
const PHONE: &[&str] = &["phone", "phoneNumber", "Phone", "mobile"];
/// Gender.
const GENDER: &[&str] = &["gender", "Gender", "sex"];

/// Farmer name.
const FARMER_NAME: &[&str] = &["name", "farmerName", "fullName", "Name"];
/// Farmer national identity number.
const FARMER_ID_NUMBER: &[&str] = &["idNumber", "idNo", "nationalId", "IdNumber"];
/// Farmer cattle count.
const FARMER_CATTLE: &[&str] = &["cattle", "Cattle", "cows"];
/// Farmer goat count.
const FARMER_GOATS: &[&str] = &["goats", "Goats"];
/// Farmer sheep count.
const FARMER_SHEEP: &[&str] = &["sheep", "Sheep"];
/// Farmer vaccination flag.
const FARMER_VACCINATED: &[&str] = &["vaccinated", "isVaccinated", "vaccination"];
/// Farmer registration timestamp.
const FARMER_TIMESTAMP: &[&str] = &["registrationDate", "createdAt", "date", "timestamp"];

/// Training topic.
const TRAINING_TOPIC: &[&str] = &["topic", "module", "trainingTopic", "Topic"];
/// Trainer name.
const TRAINING_TRAINER: &[&str] = &["trainer", "facilitator", "trainerName"];
/// Total attendees.
const TRAINING_ATTENDEES: &[&str] = &["totalFarmers", "attendees", "participants", "totalAttendees"];
/// Male attendees.
const TRAINING_MALE: &[&str] = &["maleFarmers", "male", "maleAttendees"];
/// Female attendees.
const TRAINING_FEMALE: &[&str] = &["femaleFarmers", "female", "femaleAttendees"];
/// Training timestamp.
const TRAINING_TIMESTAMP: &[&str] = &["date", "trainingDate", "createdAt", "timestamp"];

/// Offtake seller name.
const OFFTAKE_FARMER_NAME: &[&str] = &["farmerName", "name", "sellerName"];
/// Offtake seller gender.
const OFFTAKE_GENDER: &[&str] = &["gender", "farmerGender", "Gender"];
/// Offtake seller phone.
const OFFTAKE_PHONE: &[&str] = &["phone", "phoneNumber", "farmerPhone"];
/// Offtake location or market.
const OFFTAKE_LOCATION: &[&str] = &["location", "market", "village", "Location"];
/// Offtake animal list.
const OFFTAKE_ANIMALS: &[&str] = &["animals", "livestock", "animalEntries"];
/// Offtake recorded total.
const OFFTAKE_TOTAL: &[&str] = &["totalPrice", "total", "totalAmount"];
/// Offtake timestamp.
const OFFTAKE_TIMESTAMP: &[&str] = &["date", "purchaseDate", "createdAt", "timestamp"];
/// Animal kind.
const ANIMAL_KIND: &[&str] = &["type", "kind", "species", "animalType"];
/// Animal live weight.
const ANIMAL_LIVE_WEIGHT: &[&str] = &["liveWeight", "live_weight", "weight"];
/// Animal carcass weight.
const ANIMAL_CARCASS_WEIGHT: &[&str] = &["carcassWeight", "carcass_weight", "carcass"];
/// Animal price.
const ANIMAL_PRICE: &[&str] = &["price", "amount", "pricePerAnimal"];

/// Requester name.
const REQUISITION_REQUESTER: &[&str] = &["requester", "requestedBy", "name", "username"];
/// Requisition type.
const REQUISITION_TYPE: &[&str] = &["type", "requisitionType", "category"];
/// Requisition status.
const REQUISITION_STATUS: &[&str] = &["status", "Status", "approvalStatus"];
/// Requisition line items.
const REQUISITION_ITEMS: &[&str] = &["items", "costItems", "breakdown"];
/// Requisition recorded total.
const REQUISITION_TOTAL: &[&str] = &["totalAmount", "total", "amount"];
/// Requisition timestamp.
const REQUISITION_TIMESTAMP: &[&str] = &["submittedAt", "date", "createdAt", "timestamp"];
/// Line item description.
const ITEM_DESCRIPTION: &[&str] = &["description", "item", "name"];
/// Line item quantity.
const ITEM_QUANTITY: &[&str] = &["quantity", "qty"];
/// Line item unit cost.
const ITEM_UNIT_COST: &[&str] = &["unitCost", "unitPrice", "price", "cost"];
/// Line item total.
const ITEM_TOTAL: &[&str] = &["total", "amount", "totalCost"];

/// Health activity type.
const HEALTH_ACTIVITY: &[&str] = &["activity", "activityType", "type"];
/// Vaccine or drug.
const HEALTH_VACCINE: &[&str] = &["vaccine", "vaccineType", "drug", "medicine"];
/// Responsible officer.
const HEALTH_OFFICER: &[&str] = &["officer", "officerName", "vet", "conductedBy"];
/// Doses administered.
const HEALTH_DOSES: &[&str] = &["doses", "dosesAdministered", "numberOfDoses", "number_doses"];
/// Animals treated.
const HEALTH_ANIMALS: &[&str] = &["animalsTreated", "numberOfAnimals", "animals", "herdSize"];
/// Health activity timestamp.
const HEALTH_TIMESTAMP: &[&str] = &["date", "activityDate", "createdAt", "timestamp"];

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// Normalizes a raw stored record into the canonical record for `kind`.
#[must_use]
pub fn normalize(kind: EntityKind, raw: &Value, id: RecordId, now: OffsetDateTime) -> CanonicalRecord {
    match kind {
        EntityKind::Farmer => CanonicalRecord::Farmer(farmer(id, raw, now)),
        EntityKind::TrainingSession => {
            CanonicalRecord::TrainingSession(training_session(id, raw, now))
        }
        EntityKind::OfftakeTransaction => {
            CanonicalRecord::OfftakeTransaction(offtake_transaction(id, raw, now))
        }
        EntityKind::RequisitionEntry => {
            CanonicalRecord::RequisitionEntry(requisition_entry(id, raw, now))
        }
        EntityKind::AnimalHealthActivity => {
            CanonicalRecord::AnimalHealthActivity(animal_health_activity(id, raw, now))
        }
    }
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// Builds the shared record header.
fn meta(id: RecordId, raw: &Value, timestamp_aliases: &[&str], now: OffsetDateTime) -> RecordMeta {
    RecordMeta {
        id,
        programme: text(raw, PROGRAMME).map(PartitionName::new),
        recorded_at: timestamp(raw, timestamp_aliases, now),
    }
}

/// Normalizes a farmer record.
pub(crate) fn farmer(id: RecordId, raw: &Value, now: OffsetDateTime) -> Farmer {
    Farmer {
        meta: meta(id, raw, FARMER_TIMESTAMP, now),
        name: text(raw, FARMER_NAME).unwrap_or_default(),
        gender: Gender::from_raw(text(raw, GENDER).as_deref()),
        phone: text(raw, PHONE).unwrap_or_default(),
        id_number: text(raw, FARMER_ID_NUMBER).unwrap_or_default(),
        county: text(raw, COUNTY),
        subcounty: text(raw, SUBCOUNTY),
        location: text(raw, LOCATION),
        cattle: count(raw, FARMER_CATTLE),
        goats: count(raw, FARMER_GOATS),
        sheep: count(raw, FARMER_SHEEP),
        vaccinated: flag(raw, FARMER_VACCINATED),
    }
}

/// Normalizes a training session record.
pub(crate) fn training_session(id: RecordId, raw: &Value, now: OffsetDateTime) -> TrainingSession {
    let male_attendees = count(raw, TRAINING_MALE);
    let female_attendees = count(raw, TRAINING_FEMALE);
    let mut attendees = count(raw, TRAINING_ATTENDEES);
    if attendees == 0 {
        attendees = male_attendees.saturating_add(female_attendees);
    }
    TrainingSession {
        meta: meta(id, raw, TRAINING_TIMESTAMP, now),
        topic: text(raw, TRAINING_TOPIC),
        trainer: text(raw, TRAINING_TRAINER).unwrap_or_default(),
        county: text(raw, COUNTY),
        subcounty: text(raw, SUBCOUNTY),
        location: text(raw, LOCATION),
        attendees,
        male_attendees,
        female_attendees,
    }
}

/// Normalizes an offtake transaction record.
pub(crate) fn offtake_transaction(
    id: RecordId,
    raw: &Value,
    now: OffsetDateTime,
) -> OfftakeTransaction {
    let animals = list(raw, OFFTAKE_ANIMALS)
        .map(|entry| AnimalEntry {
            kind: text(entry, ANIMAL_KIND),
            live_weight: number(entry, ANIMAL_LIVE_WEIGHT),
            carcass_weight: number(entry, ANIMAL_CARCASS_WEIGHT),
            price: number(entry, ANIMAL_PRICE),
        })
        .collect();
    OfftakeTransaction {
        meta: meta(id, raw, OFFTAKE_TIMESTAMP, now),
        farmer_name: text(raw, OFFTAKE_FARMER_NAME).unwrap_or_default(),
        farmer_gender: Gender::from_raw(text(raw, OFFTAKE_GENDER).as_deref()),
        phone: text(raw, OFFTAKE_PHONE).unwrap_or_default(),
        county: text(raw, COUNTY),
        subcounty: text(raw, SUBCOUNTY),
        location: text(raw, OFFTAKE_LOCATION),
        animals,
        total_price: number(raw, OFFTAKE_TOTAL),
    }
}

/// Normalizes a requisition record.
pub(crate) fn requisition_entry(id: RecordId, raw: &Value, now: OffsetDateTime) -> RequisitionEntry {
    let items: Vec<CostItem> = list(raw, REQUISITION_ITEMS)
        .map(|entry| {
            let quantity = number(entry, ITEM_QUANTITY);
            let unit_cost = number(entry, ITEM_UNIT_COST);
            let total = match first(entry, ITEM_TOTAL) {
                Some(value) => coerce_number(value),
                None => finite_or_zero(quantity * unit_cost),
            };
            CostItem {
                description: text(entry, ITEM_DESCRIPTION),
                quantity,
                unit_cost,
                total,
            }
        })
        .collect();
    let total_amount = match first(raw, REQUISITION_TOTAL) {
        Some(value) => coerce_number(value),
        None => items.iter().map(|item| item.total).sum(),
    };
    RequisitionEntry {
        meta: meta(id, raw, REQUISITION_TIMESTAMP, now),
        requester: text(raw, REQUISITION_REQUESTER).unwrap_or_default(),
        requisition_type: text(raw, REQUISITION_TYPE),
        status: text(raw, REQUISITION_STATUS),
        county: text(raw, COUNTY),
        subcounty: text(raw, SUBCOUNTY),
        items,
        total_amount,
    }
}

/// Normalizes an animal health activity record.
pub(crate) fn animal_health_activity(
    id: RecordId,
    raw: &Value,
    now: OffsetDateTime,
) -> AnimalHealthActivity {
    AnimalHealthActivity {
        meta: meta(id, raw, HEALTH_TIMESTAMP, now),
        activity: text(raw, HEALTH_ACTIVITY),
        vaccine: text(raw, HEALTH_VACCINE),
        officer: text(raw, HEALTH_OFFICER).unwrap_or_default(),
        county: text(raw, COUNTY),
        subcounty: text(raw, SUBCOUNTY),
        location: text(raw, LOCATION),
        doses: count(raw, HEALTH_DOSES),
        animals_treated: count(raw, HEALTH_ANIMALS),
    }
}

// ============================================================================
// SECTION: Field Helpers
// ============================================================================

/// Returns true when a stored value counts as present.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    }
}

/// Returns the first alias present with a non-empty value.
fn first<'a>(raw: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().filter_map(|alias| raw.get(*alias)).find(|value| is_present(value))
}

/// Resolves a free-text field; numbers are rendered as text.
fn text(raw: &Value, aliases: &[&str]) -> Option<String> {
    aliases.iter().filter_map(|alias| raw.get(*alias)).find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Resolves a numeric field, coercing missing or malformed input to zero.
fn number(raw: &Value, aliases: &[&str]) -> f64 {
    first(raw, aliases).map_or(0.0, coerce_number)
}

/// Resolves a count field, coercing missing or malformed input to zero.
fn count(raw: &Value, aliases: &[&str]) -> u32 {
    first(raw, aliases).map_or(0, coerce_count)
}

/// Resolves a boolean flag.
fn flag(raw: &Value, aliases: &[&str]) -> bool {
    first(raw, aliases).is_some_and(coerce_flag)
}

/// Resolves a nested list, accepting arrays and index-keyed objects.
///
/// Non-object entries are skipped; absent or malformed lists are empty.
fn list<'a>(raw: &'a Value, aliases: &[&str]) -> impl Iterator<Item = &'a Value> {
    let entries: Vec<&Value> = match first(raw, aliases) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => indexed_entries(map),
        _ => Vec::new(),
    };
    entries.into_iter().filter(|entry| entry.is_object())
}

/// Orders index-keyed object entries numerically, then lexically.
fn indexed_entries(map: &Map<String, Value>) -> Vec<&Value> {
    let mut keyed: Vec<(&String, &Value)> = map.iter().collect();
    keyed.sort_by(|(left, _), (right, _)| {
        match (left.parse::<u64>(), right.parse::<u64>()) {
            (Ok(left), Ok(right)) => left.cmp(&right),
            (Ok(_), Err(_)) => std::cmp::Ordering::Less,
            (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
            (Err(_), Err(_)) => left.cmp(right),
        }
    });
    keyed.into_iter().map(|(_, value)| value).collect()
}

/// Resolves the record timestamp from the first parsable alias.
fn timestamp(raw: &Value, aliases: &[&str], now: OffsetDateTime) -> ResolvedTimestamp {
    aliases
        .iter()
        .filter_map(|alias| raw.get(*alias))
        .find_map(parse_timestamp)
        .map_or_else(|| ResolvedTimestamp::fallback(now), ResolvedTimestamp::stored)
}

// ============================================================================
// SECTION: Coercion
// ============================================================================

/// Coerces a stored value into a finite number.
///
/// Numeric strings are parsed after stripping `,` thousands separators.
/// Anything else, including non-finite results, is zero.
#[must_use]
pub fn coerce_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    finite_or_zero(parsed)
}

/// Coerces a stored value into a non-negative count.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "Value is finite, truncated, and clamped to the u32 range before casting."
)]
pub fn coerce_count(value: &Value) -> u32 {
    let number = coerce_number(value).trunc();
    if number <= 0.0 {
        return 0;
    }
    if number >= f64::from(u32::MAX) {
        return u32::MAX;
    }
    number as u32
}

/// Coerces a stored value into a boolean flag.
///
/// Accepts booleans, non-zero numbers, and the strings `true`, `yes`, `1`.
#[must_use]
pub fn coerce_flag(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1")
        }
        _ => false,
    }
}

/// Maps non-finite values to zero.
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}
