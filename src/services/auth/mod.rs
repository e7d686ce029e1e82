pub mod access_jwt;
pub mod claims;
pub mod factory;
pub mod permission;

pub use access_jwt::{AccessTokenVerifier, VerificationError, VerificationKey};
pub use claims::ClaimSet;
pub use factory::build_verifier;
