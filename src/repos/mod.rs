pub mod error;
pub mod nonce_repo;
