//! Request and Response models for the sidecar API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{validate_dm_ids, DmSendRequest, SetRequest, MAX_KEY_LENGTH};
pub use responses::{
    CacheSummary, DeleteResponse, ErrorResponse, GetResponse, HealthResponse, ProfileResponse,
    SetResponse, StatsResponse,
};
