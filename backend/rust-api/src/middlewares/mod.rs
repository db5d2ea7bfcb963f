pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, JwtClaims, JwtService};
pub use metrics::metrics_middleware;
