//! Repository traits for the durable store.
//!
//! The signaling core depends on these traits; the infrastructure layer
//! supplies the implementations (dependency inversion). The in-memory
//! implementations ship with the crate; a real deployment backs them
//! with the platform's database.

use async_trait::async_trait;
use thiserror::Error;

use super::entity::{Room, User};
use super::error::{JoinRejection, RepositoryError};
use super::value_object::{RoomId, Timestamp, UserId};

/// Result of a committed join transaction.
#[derive(Debug, Clone)]
pub struct JoinCommit {
    /// Snapshot of the target room after the join.
    pub room: Room,
    /// Room the user was evicted from, when single-room membership
    /// moved them.
    pub previous_room: Option<RoomId>,
    /// `false` when the user was already on the participant list and
    /// the commit was an idempotent no-op.
    pub newly_added: bool,
}

/// Failure of a join transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitJoinError {
    #[error("room not found")]
    RoomNotFound,
    #[error(transparent)]
    Rejected(#[from] JoinRejection),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Result of removing a participant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantRemoval {
    /// Whether a record was actually removed.
    pub removed: bool,
    /// Whether the removal emptied the participant list. The store
    /// stamps `last_participant_left_at` in the same unit when it does.
    pub room_emptied: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    async fn find_room(&self, id: &RoomId) -> Result<Option<Room>, RepositoryError>;

    async fn list_rooms(&self) -> Result<Vec<Room>, RepositoryError>;

    /// Atomically admit `user` to the target room: validate access and
    /// capacity, evict the user from any room they currently occupy,
    /// and append the participant record, all in one transactional
    /// unit. An interruption must never leave the user in neither or
    /// both rooms, and concurrent joins must observe a serializable
    /// view of capacity.
    async fn commit_join(
        &self,
        user: &User,
        room_id: &RoomId,
        secret: Option<String>,
        joined_at: Timestamp,
    ) -> Result<JoinCommit, CommitJoinError>;

    /// Remove the user's participant record. When the removal empties
    /// the list, `last_participant_left_at` is stamped with `left_at`
    /// inside the same unit.
    async fn remove_participant(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        left_at: Timestamp,
    ) -> Result<ParticipantRemoval, RepositoryError>;

    /// Delete rooms whose participant list is empty and whose last-left
    /// timestamp is older than `cutoff`. Returns the number deleted.
    async fn delete_abandoned_rooms(&self, cutoff: Timestamp) -> Result<usize, RepositoryError>;
}
