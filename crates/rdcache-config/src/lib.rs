//! Configuration for rdcache.
//!
//! Settings live in `.rdcache/config.yaml` under the project directory, or in
//! the file named by `RDCACHE_CONFIG_PATH`. Every section is optional.
//!
//! ```yaml
//! cache:
//!   enabled: true
//!   connection: default
//!   defaults:
//!     timeout: 300
//!     valtype: hash
//! connections:
//!   default:
//!     host: ${REDIS_HOST:-127.0.0.1}
//!     port: 6379
//! ```

pub mod env;
pub mod loader;
pub mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
