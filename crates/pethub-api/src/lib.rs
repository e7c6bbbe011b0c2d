// pethub-api: Async Rust clients for the PetKit and CloudPets device clouds

pub mod auth;
pub mod cloudpets;
pub mod error;
pub mod petkit;
pub mod transport;

pub use auth::{LoginGrant, Vendor};
pub use cloudpets::{CloudPetsClient, FeederDevice, PlanRecord, ServingsToday};
pub use error::Error;
pub use petkit::{CleanerAction, DailyStatistic, DeviceDetail, LitterBox, LitterState, PetKitClient};
pub use transport::{TlsMode, TransportConfig};
