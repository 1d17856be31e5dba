pub mod channel;
pub mod error;
pub mod sample_type;

pub use channel::*;
pub use error::*;
pub use sample_type::*;
