//! Domain and database models.

pub mod audit_log;
pub mod backup;
pub mod permission;
pub mod records;
pub mod role;
