//! Pure join validation.
//!
//! Capacity, duplicate-membership and private-room access checks operate
//! on plain room data so they can be shared by the router's pre-flight
//! path and the store's transactional unit, and unit-tested without a
//! live store.

use super::entity::Room;
use super::error::JoinRejection;
use super::value_object::UserId;

/// How an admitted user enters the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new participant record must be appended.
    New,
    /// The user is already on the participant list; joining again is an
    /// idempotent reconnect, not an error at the data level.
    AlreadyParticipant,
}

/// Decide whether `user_id` may enter `room`.
///
/// A private room admits users on its allow list, or anyone presenting
/// the room's shared secret. An existing participant is admitted without
/// further checks: their record already occupies a slot.
pub fn validate_join(
    room: &Room,
    user_id: &UserId,
    secret: Option<&str>,
) -> Result<Admission, JoinRejection> {
    if room.has_participant(user_id) {
        return Ok(Admission::AlreadyParticipant);
    }
    if room.is_private && !room.allowed_users.contains(user_id) {
        let secret_matches = match (room.secret.as_deref(), secret) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        };
        if !secret_matches {
            return Err(JoinRejection::Unauthorized);
        }
    }
    if room.is_full() {
        return Err(JoinRejection::Full);
    }
    Ok(Admission::New)
}
