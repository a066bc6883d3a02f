//! Forward HTTP Proxy
//!
//! Relays plain HTTP requests to the destination they name, stripping denied
//! headers from the responses, and turns `CONNECT` requests into opaque TCP tunnels.

pub mod body;
pub mod config;
pub mod dump;
pub mod error;
pub mod headers;
pub mod proxy;
pub mod relay;
pub mod server;
pub mod tunnel;

// Re-export commonly used types and functions
pub use config::{Config, load_config, parse_config};
pub use error::ProxyError;
pub use headers::{DeniedKeySet, filter_headers};
pub use proxy::Dispatcher;
pub use relay::HttpRelay;
pub use server::serve;
pub use tunnel::{CONNECT_TIMEOUT, TunnelEstablisher};
