pub mod algorithm;
pub mod identity;
pub mod jwk;
pub mod jws;
pub mod jwt;
pub mod pop;
pub mod replay;
pub mod token_issuer;
pub mod token_service;

#[cfg(test)]
pub mod test_support;

pub use token_service::{IssuanceService, TokenKind};
