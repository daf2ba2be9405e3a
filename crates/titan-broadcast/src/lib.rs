//! titan-broadcast — the encrypted broadcaster: a connection/user/group
//! index plus bounded-concurrency fan-out that seals per recipient.

pub mod broadcaster;
pub mod sender;

pub use broadcaster::Broadcaster;
pub use sender::{ConnectionSender, SendFailure};
