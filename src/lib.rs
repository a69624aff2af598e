#![forbid(unsafe_code)]
#![warn(clippy::wildcard_enum_match_arm)]

pub mod ir;
pub mod passes;
pub mod utils;
