//! Collaborator traits for the data the engine reads and mutates
//!
//! The engine never owns persistence. Services are generic over these traits
//! and storage crates implement them:
//!
//! - [`UserDirectory`] for accounts, password hashes and login-attempt counters
//! - [`TwoFactorRepository`] for per-user second-factor records

pub mod two_factor;
pub mod user;

pub use two_factor::TwoFactorRepository;
pub use user::UserDirectory;
