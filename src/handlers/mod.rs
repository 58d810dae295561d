// src/handlers/mod.rs

pub mod ai_settings;
pub mod auth;
pub mod exam_definitions;
pub mod exam_sessions;
pub mod questions;
pub mod specializations;
pub mod users;
