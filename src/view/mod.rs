//! # Device Table
//!
//! Everything that runs on the presentation thread: the [`fields`] of the table, the
//! [`model`] holding rendered cells, interactive [`command`]s and the terminal front end in
//! [`tui`].

pub mod command;
pub mod fields;
pub mod model;
pub mod tui;
