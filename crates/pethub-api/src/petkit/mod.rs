// PetKit cloud API
//
// Form-encoded requests, `{ result }` / `{ error: { code, msg } }` envelopes,
// and an `X-Session` header carrying the login token.

pub mod auth;
pub mod client;
pub mod devices;
pub mod models;

pub use client::PetKitClient;
pub use devices::CleanerAction;
pub use models::{DailyStatistic, DeviceDetail, LitterBox, LitterState, StatisticRecord};
