//! The two relay directions of the bridge and the plumbing between them.
//!
//! [`to_backend::GatewayRelay`] consumes chat gateway events and emits
//! `chat-message` events to the backend. [`to_gateway::BackendRelay`] consumes
//! backend events and mirrors them onto the gateway. The [`supervisor`] keeps
//! the backend socket alive and feeds the backend direction; the gateway
//! direction is pumped from an mpsc queue by [`to_backend::run_gateway_events`].

pub mod auth;
pub mod connector;
pub mod gateway;
pub mod link;
pub mod middleware;
pub mod supervisor;
pub mod to_backend;
pub mod to_gateway;

pub use auth::{CredentialError, Credentials};
pub use connector::{Connector, Session, WsConnector};
pub use gateway::ChatGateway;
pub use link::{BackendLink, LinkError};
pub use supervisor::{ConnectionState, Supervisor};
pub use to_backend::{GatewayHandlers, GatewayRelay, run_gateway_events};
pub use to_gateway::BackendRelay;
