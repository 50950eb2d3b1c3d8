//! In-memory repository implementations.
//!
//! A `Mutex`-guarded map stands in for the platform database: every
//! trait method is one critical section, which is what makes
//! `commit_join` a transactional unit. A DBMS-backed implementation
//! would map the same methods onto real transactions.

pub mod room;
pub mod user;

pub use room::InMemoryRoomRepository;
pub use user::InMemoryUserRepository;
