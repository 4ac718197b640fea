pub mod msg;

pub use msg::{BabylonMsg, BabylonQuery};
