use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the Question lifecycle, as far as evaluation is concerned.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionStatus {
    /// Written, waiting for someone to organise an evaluation.
    WaitingForAction,
    /// Sent back to the author for changes.
    RevisionRequired,
    /// Changed by the author, ready to be evaluated again.
    RevisionCompleted,
    /// An evaluation group is working on it.
    InElection,
    /// Evaluated, and the mean score reached the pass mark.
    Approved,
    /// Evaluated, and the mean score fell short of the pass mark.
    Denied,
}

impl QuestionStatus {
    /// States from which creating an evaluation group moves the question into election.
    pub const ELECTABLE: [QuestionStatus; 2] = [Self::WaitingForAction, Self::RevisionCompleted];

    /// Can a new evaluation group move this question into election?
    pub fn is_electable(self) -> bool {
        Self::ELECTABLE.contains(&self)
    }
}

impl From<QuestionStatus> for Bson {
    fn from(status: QuestionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
