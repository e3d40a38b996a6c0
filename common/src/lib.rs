pub mod aggregate;
pub mod config;
pub mod extract;
pub mod plot;
pub mod record;

pub const NS_PER_SEC: f64 = 1_000_000_000.0;
