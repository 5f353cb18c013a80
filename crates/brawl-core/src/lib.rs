//! Brawl - server-authoritative match orchestration for a two-player
//! fighting game.
//!
//! This crate reconciles two independently-connecting clients into one
//! authoritative fight, resolves their combat actions into a consistent
//! outcome, and reclaims records when a fight ends or a fighter
//! disappears. Network I/O is injected through the [`transport`]
//! abstraction, so the whole engine runs in tests without a socket.
//!
//! # Modules
//!
//! - [`fight`]: fight records and the combat rules enforced server-side
//! - [`registry`]: the shared id-keyed fight store
//! - [`engine`]: join coordination and action resolution
//! - [`reaper`]: deferred cleanup of finished and abandoned fights
//! - [`events`]: wire protocol events
//! - [`transport`]: outbound delivery abstraction

pub mod engine;
pub mod events;
pub mod fight;
pub mod reaper;
pub mod registry;
pub mod transport;

// Re-export commonly used types
pub use engine::Engine;
pub use events::{ActionKind, ActionRequest, ClientEvent, JoinRequest, ServerEvent};
pub use fight::{
    Admission, Fight, Fighter, FightStatus, JoinError, Outcome, Seat, BLOCK_MITIGATION, MAX_HEALTH,
};
pub use reaper::{Reaper, ReaperConfig};
pub use registry::FightRegistry;
pub use transport::{ConnectionId, Transport};
