pub mod config;
pub mod error;
pub mod extract;

pub use config::*;
pub use error::*;
pub use extract::*;
