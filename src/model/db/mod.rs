//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod evaluation_request;
pub mod question;
pub mod rows;
pub mod settings;
pub mod user;

pub use evaluation_request::{EvaluationRequest, EvaluationResponse};
pub use question::Question;
pub use rows::{QuestionEvaluationRow, RequestListFilter, RequestListRow};
pub use settings::Settings;
pub use user::{Branch, User};
