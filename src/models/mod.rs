// src/models/mod.rs

pub mod audit_log;
pub mod class;
pub mod question;
pub mod quiz;
pub mod results;
pub mod stats;
pub mod submission;
pub mod user;
