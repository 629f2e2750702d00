//! Client side of the ERP the itinerary reads from.
//!
//! - [`token`]: credentials and their refresh ([`TokenSource`]).
//! - [`gateway`]: the two forwarded requests ([`UpstreamGateway`]).
//! - [`wire`]: typed views of the upstream payloads.

pub mod error;
pub mod gateway;
pub mod token;
pub mod wire;

pub use error::ApiError;
pub use gateway::UpstreamGateway;
pub use token::{NoAuth, PasswordLogin, StaticToken, TokenSource};
