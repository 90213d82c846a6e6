// SQLite backend
//
// - driver: opens physical connections for a `Connector`
// - params: conversion between `RowValues` and rusqlite values
// - query: result extraction and building
// - executor: statement, batch and script execution

pub mod driver;
pub mod executor;
pub mod params;
pub mod query;

pub use driver::{DEFAULT_BUSY_TIMEOUT, SqliteDriver};
pub use params::Params;
pub use query::build_result_set;
