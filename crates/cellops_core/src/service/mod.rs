//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep transport/API layers decoupled from storage details.

pub mod health;
pub mod reconcile;
pub mod report_service;
pub mod trends;
