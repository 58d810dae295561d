// src/models/mod.rs

pub mod ai_settings;
pub mod exam_definition;
pub mod exam_session;
pub mod question;
pub mod specialization;
pub mod user;
