//! Transfer Check API Library
//!
//! Resolves a phone number (in any historical format) or free text to the single
//! sales opportunity an agent should see, prioritizing disqualified records.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core matching logic.
//! - `integrations`: Record store backends.
//! - `circuit_breaker`: Circuit breaker around store calls.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `dq`: Disqualification classifier.
//! - `engine`: Tiered search and selection.
//! - `errors`: Error handling types.
//! - `fingerprint`: Log-safe term fingerprints.
//! - `handlers`: HTTP request handlers.
//! - `legacy`: Legacy display projection and warnings.
//! - `memory_store`: In-memory record store.
//! - `models`: Core data models.
//! - `pg_store`: Postgres record store.
//! - `phone`: Phone normalization and format variants.
//! - `rest_store`: PostgREST record store.
//! - `store`: Record store trait and errors.

pub mod api;
pub mod core;
pub mod integrations;

pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod dq;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod handlers;
pub mod legacy;
pub mod memory_store;
pub mod models;
pub mod pg_store;
pub mod phone;
pub mod rest_store;
pub mod store;
