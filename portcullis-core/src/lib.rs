//! Core of the portcullis authentication engine
//!
//! This crate contains the session-security engine: credential verification,
//! account lockout, token issuance, verification and rotation, token
//! revocation, and second-factor verification.
//!
//! Persistence and delivery are external collaborators, expressed as traits:
//!
//! - [`repositories::UserDirectory`] and [`repositories::TwoFactorRepository`] for storage
//! - [`revocation::RevocationStore`] for the TTL-bound revocation set
//! - [`notification::NotificationSender`] for one-time code delivery
//! - [`clock::Clock`] for the current time
//!
//! Storage crates implement the traits; the `portcullis` crate wires everything
//! together. See [`services::SessionService`] for the login, refresh and logout
//! flows.
pub mod clock;
pub mod crypto;
pub mod error;
pub mod events;
pub mod id;
pub mod notification;
pub mod repositories;
pub mod revocation;
pub mod services;
pub mod token;
pub mod two_factor;
pub mod user;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use events::{Event, EventBus, EventHandler, UnlockReason};
pub use notification::NotificationSender;
pub use repositories::{TwoFactorRepository, UserDirectory};
pub use revocation::{RevocationService, RevocationStore};
pub use token::{TokenClaims, TokenPair, TokenType};
pub use two_factor::{TwoFactorKind, TwoFactorMethod};
pub use user::{AuthorizationClaims, LoginAttemptState, User, UserId, UserRecord};
