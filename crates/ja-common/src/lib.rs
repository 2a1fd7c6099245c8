//! Shared models, input validation, credential hashing and PostgreSQL access
//! for the job-application backend.

pub mod api;
pub mod db;
pub mod logging;
pub mod password;
pub mod validation;
