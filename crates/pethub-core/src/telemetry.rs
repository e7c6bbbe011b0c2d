// ── Bluetooth scale telemetry ──
//
// Decoding of the body-composition scale's 13-byte service-data frame,
// plus a bounded intake queue that decouples the radio callback from
// consumers. Decoding is synchronous and side-effect free.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::{Uuid, uuid};

/// Length of a scale frame.
pub const FRAME_LEN: usize = 13;

/// GATT Body Composition service.
pub const BODY_COMPOSITION_SERVICE: Uuid = uuid!("0000181b-0000-1000-8000-00805f9b34fb");
/// GATT Weight Scale service.
pub const WEIGHT_SCALE_SERVICE: Uuid = uuid!("0000181d-0000-1000-8000-00805f9b34fb");

const UNIT_POUNDS: u8 = 0x01;
const UNIT_CATTY: u8 = 0x10;
const STABILIZED: u8 = 0x20;

const POUND_KG: f64 = 0.453_592;
const MAX_PLAUSIBLE_IMPEDANCE: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Telemetry frame too short: {len} bytes (need {FRAME_LEN})")]
    TooShort { len: usize },
}

/// Display unit the scale was set to when it measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[strum(serialize = "kg")]
    Kilograms,
    #[strum(serialize = "lb")]
    Pounds,
    #[strum(serialize = "jin")]
    Catty,
}

/// One decoded scale measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryFrame {
    /// Weight in kilograms, rounded to 2 decimals.
    pub weight_kg: f64,
    /// Raw impedance reading.
    pub impedance: u16,
    /// `false` while the scale is still settling.
    pub stabilized: bool,
    pub unit_hint: WeightUnit,
    pub raw_weight: u16,
}

impl TelemetryFrame {
    /// Impedance if it lies in the range a body can produce.
    ///
    /// Zero means no body-fat measurement was taken; large values are
    /// seen while the user steps on or off.
    pub fn impedance_ohms(&self) -> Option<u16> {
        (self.impedance > 0 && self.impedance < MAX_PLAUSIBLE_IMPEDANCE).then_some(self.impedance)
    }
}

/// Decode a raw scale frame.
///
/// Bytes beyond the first 13 are ignored.
pub fn decode(frame: &[u8]) -> Result<TelemetryFrame, DecodeError> {
    let bytes: [u8; FRAME_LEN] = frame
        .get(..FRAME_LEN)
        .and_then(|head| head.try_into().ok())
        .ok_or(DecodeError::TooShort { len: frame.len() })?;

    let control = bytes[0];
    let stabilized = bytes[1] & STABILIZED != 0;
    let impedance = u16::from_le_bytes([bytes[9], bytes[10]]);
    let raw_weight = u16::from_le_bytes([bytes[11], bytes[12]]);
    let raw = f64::from(raw_weight);

    // Catty wins when both unit bits are set.
    let (unit_hint, weight_kg) = if control & UNIT_CATTY != 0 {
        (WeightUnit::Catty, raw / 200.0 * 0.5)
    } else if control & UNIT_POUNDS != 0 {
        (WeightUnit::Pounds, raw * 0.005 * POUND_KG)
    } else {
        (WeightUnit::Kilograms, raw / 200.0)
    };

    Ok(TelemetryFrame {
        weight_kg: round2(weight_kg),
        impedance,
        stabilized,
        unit_hint,
        raw_weight,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Intake queue ────────────────────────────────────────────────────

/// Service data captured from one BLE advertisement.
#[derive(Debug, Clone)]
pub struct Advertisement {
    /// Device address as reported by the radio host.
    pub address: String,
    pub service_uuid: Uuid,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

/// A decoded measurement tagged with its origin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub address: String,
    pub frame: TelemetryFrame,
    pub received_at: DateTime<Utc>,
}

/// Radio-side handle of the intake queue. Never blocks.
#[derive(Clone)]
pub struct AdvertisementSink {
    tx: mpsc::Sender<Advertisement>,
    dropped: Arc<AtomicU64>,
}

/// Consumer side of the intake queue.
pub struct ReadingStream {
    rx: mpsc::Receiver<Advertisement>,
    dropped: Arc<AtomicU64>,
}

/// Create a bounded intake queue holding at most `capacity` frames.
pub fn intake(capacity: usize) -> (AdvertisementSink, ReadingStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        AdvertisementSink {
            tx,
            dropped: Arc::clone(&dropped),
        },
        ReadingStream { rx, dropped },
    )
}

impl AdvertisementSink {
    /// Enqueue an advertisement. Returns `false` if it was dropped
    /// because the queue is full or the consumer is gone.
    pub fn offer(&self, advertisement: Advertisement) -> bool {
        match self.tx.try_send(advertisement) {
            Ok(()) => true,
            Err(TrySendError::Full(advertisement)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(address = %advertisement.address, dropped, "telemetry queue full, dropping frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("telemetry consumer gone");
                false
            }
        }
    }

    /// Frames dropped so far because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ReadingStream {
    /// Next decoded reading. Skips non-scale service data and malformed
    /// frames; `None` once every sink is gone and the queue is drained.
    pub async fn next(&mut self) -> Option<Reading> {
        while let Some(advertisement) = self.rx.recv().await {
            if advertisement.service_uuid != BODY_COMPOSITION_SERVICE
                && advertisement.service_uuid != WEIGHT_SCALE_SERVICE
            {
                debug!(uuid = %advertisement.service_uuid, "ignoring non-scale service data");
                continue;
            }

            match decode(&advertisement.payload) {
                Ok(frame) => {
                    return Some(Reading {
                        address: advertisement.address,
                        frame,
                        received_at: advertisement.received_at,
                    });
                }
                Err(e) => warn!(address = %advertisement.address, error = %e, "undecodable scale frame"),
            }
        }
        None
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
