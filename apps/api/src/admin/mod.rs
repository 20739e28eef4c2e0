//! Admin-only management endpoints, mounted under `/api/admin` behind
//! `require_admin`. Industry CRUD lives in `industries::handlers`.

pub mod catalog;
pub mod stats;
pub mod users;
