// PetKit wire types
//
// Only the fields the hub consumes are modelled; everything else in the
// vendor payloads is ignored by serde.

use serde::{Deserialize, Deserializer};

/// Generic PetKit envelope: exactly one of `result` / `error` is present.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: Option<T>,
    pub error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvelopeError {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
}

// ── Login ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResult {
    pub session: SessionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionInfo {
    pub id: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

// ── Devices ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceRoster {
    #[serde(default)]
    pub devices: Vec<RosterEntry>,
}

/// One entry of the family roster. Pets share the roster with hardware.
#[derive(Debug, Deserialize)]
pub(crate) struct RosterEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: RosterData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RosterData {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// A litter box reported by the PetKit roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LitterBox {
    pub id: i64,
    pub name: String,
    /// Normalised uppercase model code (`T3`, `T4`, `T5`).
    pub model: String,
}

impl LitterBox {
    /// Path segment used by model-specific endpoints (`t4/controlDevice`).
    pub fn path_segment(&self) -> String {
        self.model.to_ascii_lowercase()
    }
}

// ── Device detail ───────────────────────────────────────────────────

/// Model-specific detail document (`t4/device_detail`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceDetail {
    #[serde(default)]
    pub state: Option<LitterState>,
}

/// Consumables and alarm flags reported in the device state.
///
/// `used_times` is the lifetime usage counter, unrelated to today's visits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LitterState {
    #[serde(default)]
    pub sand_percent: Option<u8>,
    #[serde(default)]
    pub deodorant_left_days: Option<u32>,
    #[serde(default)]
    pub used_times: Option<u64>,
    #[serde(default, deserialize_with = "flag")]
    pub box_full: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub sand_lack: Option<bool>,
    #[serde(default, deserialize_with = "flag")]
    pub liquid_lack: Option<bool>,
}

/// Alarm flags arrive as booleans on newer firmware and as 0/1 on older.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Bool(b) => b,
        Raw::Int(n) => n != 0,
    }))
}

// ── Statistics ──────────────────────────────────────────────────────

/// Daily usage counters for one litter box.
///
/// `times` is the authoritative "visits today" counter. It is absent while
/// the cloud has not yet aggregated the day.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStatistic {
    #[serde(default)]
    pub times: Option<u64>,
    #[serde(default)]
    pub avg_time: Option<u64>,
    #[serde(default)]
    pub total_time: Option<u64>,
    #[serde(default)]
    pub statistic_info: Vec<StatisticRecord>,
    /// Set by the cloud while the day's records are still syncing.
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticRecord {
    /// Pet weight in grams.
    #[serde(default)]
    pub pet_weight: Option<u64>,
    /// Visit start, Unix seconds.
    #[serde(default)]
    pub time: Option<i64>,
}
