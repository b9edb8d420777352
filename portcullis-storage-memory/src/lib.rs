//! In-process storage for portcullis
//!
//! [`MemoryUserDirectory`] and [`MemoryTwoFactorRepository`] keep their data in
//! sharded concurrent maps. Every counter, code and challenge mutation happens
//! while holding the shard lock for that record, which gives the same
//! per-record atomicity a SQL backend gets from conditional `UPDATE`s.
//!
//! They are suitable for tests, single-process deployments and as a reference
//! for backend authors.
//!
//! ```
//! use portcullis_core::UserRecord;
//! use portcullis_storage_memory::MemoryUserDirectory;
//!
//! let users = MemoryUserDirectory::new();
//! let record = UserRecord::builder()
//!     .email("alice@example.com")
//!     .password_hash("$2b$12$...")
//!     .build()
//!     .unwrap();
//! users.insert(record).unwrap();
//! assert_eq!(users.len(), 1);
//! ```
mod two_factor;
mod user;

pub use two_factor::MemoryTwoFactorRepository;
pub use user::MemoryUserDirectory;
