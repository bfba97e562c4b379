//! Telein → IPLUC lead bridge.
//!
//! Receives IVR callbacks from Telein, extracts the caller's lead fields from
//! loosely shaped payloads, normalizes the phone number and forwards a
//! fixed-shape record to the IPLUC CRM.
//!
//! # Modules
//!
//! - `api`: HTTP-facing handlers.
//! - `core`: Classification, extraction and error types.
//! - `integrations`: Telein payload models and the CRM client.
//! - `admin_handler`: Runtime configuration endpoints.
//! - `classification`: Decides which events become leads.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `extraction`: Field extraction and phone normalization.
//! - `handlers`: Shared state, router and diagnostics.
//! - `ipluc_client`: CRM client.
//! - `webhook_handler`: Telein webhook handler.
//! - `webhook_models`: Telein payload models.

pub mod api;
pub mod core;
pub mod integrations;

pub mod admin_handler;
pub mod classification;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod handlers;
pub mod ipluc_client;
pub mod webhook_handler;
pub mod webhook_models;
