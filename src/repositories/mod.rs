//! # Repository Layer
//!
//! Repositories encapsulate SeaORM operations for the connect entities,
//! including the encrypt/decrypt boundary for every secret-bearing column.

pub mod consumer;
pub mod integration;
pub mod oauth2_credential;

pub use consumer::ConsumerRepository;
pub use integration::IntegrationRepository;
pub use oauth2_credential::{DecryptedOauth2Credential, Oauth2CredentialRepository};
