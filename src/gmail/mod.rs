// Gmail access: REST client, OAuth2 exchange and CLI token storage

pub mod auth;
pub mod client;
pub mod token_store;

pub use auth::{check_status, AuthStatus, OAuthClient, OAuthToken};
pub use client::{GmailClient, Profile};
pub use token_store::TokenStore;
