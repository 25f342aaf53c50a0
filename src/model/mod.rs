//! Data types, split by where they are (de)serialised.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
