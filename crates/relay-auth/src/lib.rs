//! # relay-auth
//!
//! The Authorization Gate: a bearer token is verified once, before the
//! transport upgrade, against the issuer and client the caller names.
//!
//! - [`AuthorizationGate`]: `authorize(&AuthContext) -> Verdict`
//! - [`TokenVerifier`]: the token verification collaborator
//! - [`JwtVerifier`]: signed-JWT verification over a [`KeyProvider`]
//! - [`SharedSecretKeys`] / [`RemoteJwks`]: HMAC secret or published key set

#![deny(unsafe_code)]

pub mod errors;
pub mod gate;
pub mod keys;
pub mod verifier;

pub use errors::AuthError;
pub use gate::{AuthContext, AuthorizationGate, Principal, Verdict};
pub use keys::{KeyProvider, RemoteJwks, SharedSecretKeys};
pub use verifier::{Claims, JwtVerifier, TokenVerifier};
