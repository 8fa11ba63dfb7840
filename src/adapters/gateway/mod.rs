//! Payment gateway adapters.

mod http_gateway;
mod mock_gateway;

pub use http_gateway::{HttpGatewayConfig, HttpPaymentGateway};
pub use mock_gateway::MockPaymentGateway;
