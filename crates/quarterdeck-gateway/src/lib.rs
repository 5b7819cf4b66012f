//! Remote API access for the Quarterdeck console.
//!
//! Every call to the management panel goes through one chokepoint, the
//! [`client::GatewayClient`], which owns retry policy, response-envelope
//! normalization and failure classification. Typed repositories in
//! [`repos`] express entity operations purely as gateway calls.

pub mod client;
pub mod pagination;
pub mod repos;
pub mod transport;

pub use client::GatewayClient;
pub use repos::Repositories;
pub use transport::{ApiRequest, HttpTransport, Method, RawResponse, ReqwestTransport};
