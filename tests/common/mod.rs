#![allow(dead_code)]

pub mod mock_transport;
pub mod strategies;

pub use mock_transport::*;
pub use strategies::*;

use dispatch_core::{Client, ClientConfig};
use std::sync::Arc;

/// Client over `transport` with default configuration.
pub fn client_with(transport: &Arc<MockTransport>) -> Client {
    Client::new(transport.clone(), ClientConfig::default())
}
