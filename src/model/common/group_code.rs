use std::fmt::Display;
use std::str::FromStr;

use mongodb::bson::Bson;
use rand::{distributions::Alphanumeric, Rng};
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const LENGTH: usize = 6;

/// The token shared by every evaluation request created together for one question.
///
/// Always exactly six uppercase ASCII letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupCode(String);

impl GroupCode {
    /// Generate a random code. Collisions are improbable enough to be ignored.
    pub fn random() -> Self {
        let code = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(LENGTH)
            .map(|byte| char::from(byte).to_ascii_uppercase())
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for GroupCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

impl FromStr for GroupCode {
    type Err = ParseError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let len = string.chars().count();
        if len != LENGTH {
            return Err(ParseError::InvalidLength(len));
        }
        if let Some(c) = string
            .chars()
            .find(|c| !(c.is_ascii_uppercase() || c.is_ascii_digit()))
        {
            return Err(ParseError::InvalidChar(c));
        }
        Ok(Self(string.to_string()))
    }
}

impl TryFrom<String> for GroupCode {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupCode> for String {
    fn from(code: GroupCode) -> Self {
        code.0
    }
}

impl From<&GroupCode> for Bson {
    fn from(code: &GroupCode) -> Self {
        Bson::String(code.0.clone())
    }
}

impl<'a> FromParam<'a> for GroupCode {
    type Error = ParseError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("group code must contain exactly 6 characters, got {0}")]
    InvalidLength(usize),
    #[error("group code must contain only uppercase letters and digits, found '{0}'")]
    InvalidChar(char),
}
