// CloudPets cloud API
//
// Form-encoded requests with an `authorization` header and a
// `{ code, msg, result }` envelope. Feeder control and feeding plans.

pub mod auth;
pub mod client;
pub mod feeder;
pub mod models;
pub mod plans;

pub use auth::normalize_account;
pub use client::CloudPetsClient;
pub use models::{FeederDevice, PlanRecord, ServingsToday};
