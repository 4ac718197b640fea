pub mod adaptor_sig;
pub mod error;
pub mod scripts_utils;
pub mod sig_verify;
pub mod signing_context;
pub mod tx_verify;
pub mod witness;

pub use adaptor_sig::AdaptorSignature;

pub type Result<T> = std::result::Result<T, error::Error>;
