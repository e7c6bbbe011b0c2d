// ── Stats reconciliation ──
//
// Vendor counters arrive as a `StatsCandidate`, possibly marked degraded
// for metrics the vendor could not report authoritatively. The reconciler
// prefers fresh data, falls back to the previously cached snapshot for
// degraded metrics (flagging the result stale with a warning), and never
// invents a value.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pethub_api::Vendor;
use serde::Serialize;

use crate::adapter::StatsCandidate;
use crate::dispatch::Operation;
use crate::error::CoreError;

/// Normalized metric names across vendors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    /// Litter-box visits today.
    TodayVisits,
    AverageVisitSecs,
    TotalVisitSecs,
    /// Most recent pet weight recorded by the litter box.
    LastPetWeight,
    SandPercent,
    DeodorantLeftDays,
    /// Lifetime usage counter. Unrelated to `TodayVisits`.
    UsedTimes,
    BoxFull,
    SandLack,
    LiquidLack,
    /// Feeder servings dispensed today.
    ServingsToday,
    LastFeedAt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(u64),
    Seconds(u64),
    Kilograms(f64),
    Percent(u8),
    Days(u32),
    Flag(bool),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Seconds(secs) => write!(f, "{secs}s"),
            Self::Kilograms(kg) => write!(f, "{kg:.2} kg"),
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Days(1) => f.write_str("1 day"),
            Self::Days(days) => write!(f, "{days} days"),
            Self::Flag(flag) => f.write_str(if *flag { "yes" } else { "no" }),
            Self::Timestamp(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatsSource {
    VendorAuthoritative,
    LocalFallback,
}

/// Reconciled statistics for one device.
///
/// A vendor-authoritative snapshot is only stale when the vendor itself
/// marked its response partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub vendor: Vendor,
    pub device_id: String,
    pub metrics: BTreeMap<Metric, MetricValue>,
    pub source: StatsSource,
    pub stale: bool,
    pub warnings: Vec<String>,
    pub as_of: DateTime<Utc>,
}

/// Merge a fresh candidate with the previous snapshot, if any.
pub fn reconcile(
    candidate: StatsCandidate,
    previous: Option<&StatsSnapshot>,
) -> Result<StatsSnapshot, CoreError> {
    if candidate.degraded.is_empty() {
        return Ok(StatsSnapshot {
            vendor: candidate.vendor,
            device_id: candidate.device_id,
            metrics: candidate.metrics,
            source: StatsSource::VendorAuthoritative,
            stale: candidate.partial,
            warnings: if candidate.partial {
                vec!["vendor marked this response as partial".into()]
            } else {
                Vec::new()
            },
            as_of: candidate.fetched_at,
        });
    }

    let previous = previous
        .filter(|p| p.vendor == candidate.vendor && p.device_id == candidate.device_id);

    let Some(previous) = previous else {
        let missing: Vec<String> = candidate.degraded.iter().map(ToString::to_string).collect();
        return Err(CoreError::VendorUnavailable {
            vendor: candidate.vendor,
            operation: Operation::FetchStats,
            attempts: 1,
            message: format!(
                "{} not reported for device {} and no cached snapshot is available",
                missing.join(", "),
                candidate.device_id
            ),
        });
    };

    let mut metrics = candidate.metrics;
    let mut warnings = Vec::new();
    for metric in &candidate.degraded {
        metrics.remove(metric);
        match previous.metrics.get(metric) {
            Some(value) => {
                warnings.push(format!(
                    "{metric} could not be refreshed; showing cached value from {}",
                    previous.as_of.format("%Y-%m-%d %H:%M UTC")
                ));
                metrics.insert(*metric, value.clone());
            }
            None => warnings.push(format!("{metric} could not be refreshed and has no cached value")),
        }
    }

    Ok(StatsSnapshot {
        vendor: candidate.vendor,
        device_id: candidate.device_id,
        metrics,
        source: StatsSource::LocalFallback,
        stale: true,
        warnings,
        as_of: candidate.fetched_at,
    })
}

// ── Cache collaborator ──────────────────────────────────────────────

/// Source of previously persisted snapshots. Read-only to the core;
/// the host's persistence layer writes it.
pub trait StatsCache: Send + Sync {
    fn previous(&self, vendor: Vendor, device_id: &str) -> Option<StatsSnapshot>;
}

/// In-memory `StatsCache` for hosts without persistence, and tests.
#[derive(Debug, Default)]
pub struct MemoryStatsCache {
    snapshots: DashMap<(Vendor, String), StatsSnapshot>,
}

impl MemoryStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, snapshot: StatsSnapshot) {
        self.snapshots
            .insert((snapshot.vendor, snapshot.device_id.clone()), snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl StatsCache for MemoryStatsCache {
    fn previous(&self, vendor: Vendor, device_id: &str) -> Option<StatsSnapshot> {
        self.snapshots
            .get(&(vendor, device_id.to_owned()))
            .map(|entry| entry.value().clone())
    }
}
