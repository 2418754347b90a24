//! Business logic services.

pub mod audit_service;
pub mod backup_service;
pub mod permission_service;
pub mod session_service;
