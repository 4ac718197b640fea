mod eots;
pub mod error;

pub use eots::*;
pub use error::Error;

pub type Result<T> = std::result::Result<T, Error>;
