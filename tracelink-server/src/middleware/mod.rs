//! Request middleware

mod auth;

pub use auth::{AccessConfig, ApiKey, AuthContext, AuthLayer, auth_middleware};
