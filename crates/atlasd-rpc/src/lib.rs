//! Atlas naming-protocol RPC server: method registry, handlers, and the
//! XML-RPC/HTTP transport (spec §4.3, §4.4, §6, §7).

pub mod api_registry;
pub mod error;
pub mod methods;
pub mod rate_limiter;
pub mod server;
pub mod transport;
pub mod types;
pub mod validation;

pub use error::{Result, RpcError};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
pub use server::{RpcServer, RpcServerBuilder};
pub use transport::router;
