// pethub-core: Device-integration layer between the vendor clouds and consumers (CLI/hosts).

pub mod adapter;
pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod session;
pub mod stats;
pub mod telemetry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{Ack, Action, Capability, DeviceRef, StatsCandidate};
pub use config::{CloudPetsConfig, HubConfig, PetKitConfig, RetryPolicy};
pub use credentials::{Credential, CredentialStore};
pub use dispatch::{Dispatcher, Operation};
pub use error::{AuthCause, CoreError, Remedy};
pub use hub::Hub;
pub use session::{Session, SessionManager, SessionStatus};
pub use stats::{MemoryStatsCache, Metric, MetricValue, StatsCache, StatsSnapshot, StatsSource};
pub use telemetry::{Advertisement, DecodeError, Reading, TelemetryFrame, WeightUnit};

pub use pethub_api::{PlanRecord, TlsMode, Vendor};
