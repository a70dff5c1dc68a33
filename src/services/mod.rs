// src/services/mod.rs

//! Business operations. Handlers stay thin and call into these with the
//! shared `AppState`, the authenticated `Actor` and the current time.

pub mod authoring;
pub mod classes;
pub mod dashboard;
pub mod lifecycle;
pub mod results;
pub mod scoring;
pub mod users;
