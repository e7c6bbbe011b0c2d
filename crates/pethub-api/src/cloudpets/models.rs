// CloudPets wire types
//
// CloudPets is loose with scalar types: ids arrive as numbers or strings,
// weekdays as arrays or comma-separated strings. The helpers at the bottom
// normalise those shapes.

use serde::{Deserialize, Deserializer, Serialize};

/// Envelope status shared by every CloudPets response.
#[derive(Debug, Deserialize)]
pub(crate) struct Status {
    pub code: Option<i64>,
    pub msg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: Option<T>,
}

// ── Login ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    pub authorization: Option<String>,
    pub result: Option<serde_json::Value>,
}

// ── Devices ─────────────────────────────────────────────────────────

/// A feeder registered to the configured family.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeederDevice {
    #[serde(deserialize_with = "string_or_number")]
    pub device_id: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub device_type: Option<String>,
}

/// Portions dispensed today.
///
/// `servings` is the vendor's authoritative counter and may be missing
/// when the feeder has not synced yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServingsToday {
    #[serde(default, alias = "servingsToday", alias = "num")]
    pub servings: Option<u64>,
    /// Last dispense, Unix milliseconds.
    #[serde(default)]
    pub last_feed_time: Option<i64>,
}

/// `servingsToday` answers either a bare number or an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ServingsResult {
    Count(u64),
    Detail(ServingsToday),
}

impl From<ServingsResult> for ServingsToday {
    fn from(value: ServingsResult) -> Self {
        match value {
            ServingsResult::Count(n) => Self {
                servings: Some(n),
                last_feed_time: None,
            },
            ServingsResult::Detail(detail) => detail,
        }
    }
}

// ── Feeding plans ───────────────────────────────────────────────────

/// One scheduled feeding as stored by CloudPets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_u8")]
    pub hour: u8,
    #[serde(default, deserialize_with = "lenient_u8")]
    pub minute: u8,
    #[serde(default = "default_serving")]
    pub serving: u32,
    #[serde(default = "default_enable")]
    pub enable: bool,
    #[serde(default, deserialize_with = "weekdays")]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub remark: Option<String>,
}

fn default_serving() -> u32 {
    1
}

fn default_enable() -> bool {
    true
}

/// Plan lists come back as top-level `rows`, a bare `result` array, or a
/// paged `result.list`.
#[derive(Debug, Deserialize)]
pub(crate) struct PlanListBody {
    pub rows: Option<Vec<PlanRecord>>,
    pub result: Option<PlanListResult>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum PlanListResult {
    Flat(Vec<PlanRecord>),
    Paged { list: Vec<PlanRecord> },
}

impl PlanListBody {
    pub(crate) fn into_records(self) -> Vec<PlanRecord> {
        match (self.rows, self.result) {
            (Some(rows), _) => rows,
            (None, Some(PlanListResult::Flat(list) | PlanListResult::Paged { list })) => list,
            (None, None) => Vec::new(),
        }
    }
}

// ── Lenient scalar helpers ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Int(i64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Int(n) => n.to_string(),
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Scalar::deserialize(de).map(Scalar::into_string)
}

fn opt_string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(de)?.map(Scalar::into_string))
}

fn lenient_u8<'de, D: Deserializer<'de>>(de: D) -> Result<u8, D::Error> {
    use serde::de::Error;

    let raw = Scalar::deserialize(de)?.into_string();
    raw.trim()
        .parse()
        .map_err(|_| D::Error::custom(format!("expected a small integer, got '{raw}'")))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Weekdays {
    List(Vec<u8>),
    Csv(String),
}

fn weekdays<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
    Ok(match Option::<Weekdays>::deserialize(de)? {
        Some(Weekdays::List(days)) => days,
        Some(Weekdays::Csv(csv)) => csv
            .split(',')
            .filter_map(|d| d.trim().parse().ok())
            .collect(),
        None => Vec::new(),
    })
}
