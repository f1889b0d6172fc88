//! Data models exchanged with the backend.
//!
//! - `Profile`, `Role`: the user-facing identity projection
//! - `RemoteProfile`: the `/profile/` response used to enrich it
//! - `LoginRequest`, `TokenResponse`: `/auth/login` and `/auth/refresh` bodies

pub mod profile;
pub mod token;

pub use profile::{Profile, RemoteCompany, RemoteProfile, RemoteUser, Role};
pub use token::{LoginRequest, TokenResponse};
