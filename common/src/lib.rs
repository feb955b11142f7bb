//! Types shared between the admissions backend and its clients.
//!
//! Everything in here is plain serde data: no I/O, no database access. The
//! backend builds these values and serializes them as JSON responses.

pub mod jobs;
pub mod model;
pub mod requests;
