// src/handlers/mod.rs

pub mod admin;
pub mod auth;
pub mod classes;
pub mod quizzes;
pub mod submissions;
