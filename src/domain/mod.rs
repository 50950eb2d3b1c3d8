//! Domain layer: entities, value objects, the pure join policy, and the
//! traits the signaling core depends on (dependency inversion: the
//! infrastructure layer provides the implementations).

pub mod entity;
pub mod error;
pub mod policy;
pub mod pusher;
pub mod repository;
pub mod value_object;

pub use entity::{Participant, Room, User};
pub use error::{InvalidId, JoinRejection, RepositoryError};
pub use policy::{Admission, validate_join};
pub use pusher::{MessagePushError, MessagePusher, PusherChannel};
pub use repository::{
    CommitJoinError, JoinCommit, ParticipantRemoval, RoomRepository, UserRepository,
};
pub use value_object::{ConnectionId, RoomId, Timestamp, UserId};
