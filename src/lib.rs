//! mcc: compiler for `.mc` music source files.

pub mod config;
pub mod dsl;
pub mod music;
