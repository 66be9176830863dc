//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate policy checks and repository calls into use-case APIs.
//! - Keep CLI/API layers decoupled from storage details.

pub mod attendance_service;
pub mod report_service;
