//! Types shared between the database and API representations.

pub mod group_code;
pub mod question_status;

pub use group_code::GroupCode;
pub use question_status::QuestionStatus;
