//! Conversation session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::{Effect, Notification, NotificationLevel};
pub use event::{Event, NewMessage};
pub use state::{Conversation, Message, Phase, ReplyStatus, Sender, SessionState};
pub use transition::{transition, TransitionError};
