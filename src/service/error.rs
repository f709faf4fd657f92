//! Service Errors

use thiserror::Error;

use crate::core::sign::SignError;
use crate::game::action::ActionError;
use crate::service::ports::PortError;

/// Errors returned by the battle service.
#[derive(Debug, Error)]
pub enum BattleError {
    /// No battle with the given id.
    #[error("battle not found")]
    NotFound,

    /// The user is not one of the two participants.
    #[error("not a participant in this battle")]
    NotParticipant,

    /// The submitted action failed validation. Nothing was mutated.
    #[error(transparent)]
    InvalidAction(#[from] ActionError),

    /// The other participant acts next.
    #[error("not your turn")]
    NotYourTurn,

    /// The battle already reached a terminal state.
    #[error("battle already finished")]
    AlreadyFinished,

    /// Team selection rejected at battle start.
    #[error("invalid team: {0}")]
    InvalidTeam(String),

    /// The stored replay failed its integrity check, or a finished battle
    /// is missing one.
    #[error("replay integrity check failed")]
    IntegrityFailure,

    /// Replay signing failed.
    #[error(transparent)]
    Sign(#[from] SignError),

    /// An upstream source or the store failed.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<PortError> for BattleError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound => BattleError::NotFound,
            PortError::Unavailable(msg) | PortError::Storage(msg) => BattleError::Upstream(msg),
        }
    }
}
