//! REST API for the Tickler job scheduler.
//!
//! Routes:
//! - `POST /jobs`: schedule a job
//! - `GET /jobs`: list jobs
//! - `GET /jobs/{id}`: inspect a job
//! - `DELETE /jobs/{id}`: cancel a scheduled job
//! - `GET /health`: liveness and job count

mod error;
mod routes;

pub use error::WebError;
pub use routes::{AppState, CreateJobRequest, create_router};
