//! Services composing the collaborator traits into the engine's operations
//!
//! | Service                 | Responsibility                                          |
//! | ----------------------- | ------------------------------------------------------- |
//! | [`PasswordService`]     | bcrypt hashing and verification                         |
//! | [`CredentialVerifier`]  | email + password check against the user directory      |
//! | [`LockoutService`]      | failed-login counting and account lockout               |
//! | [`TwoFactorService`]    | TOTP, email codes and backup codes                      |
//! | [`SessionService`]      | login, two-factor completion, refresh and logout        |

pub mod credential;
pub mod lockout;
pub mod session;
pub mod totp;
pub mod two_factor;

#[cfg(test)]
pub(crate) mod mock;

pub use credential::{CredentialVerifier, MIN_BCRYPT_COST, PasswordConfig, PasswordService};
pub use lockout::{FailureOutcome, LockoutConfig, LockoutService};
pub use session::{AuthenticatedSession, LoginOutcome, SessionService, TwoFactorChallenge};
pub use totp::{TotpEnrollment, TotpGenerator};
pub use two_factor::TwoFactorService;
