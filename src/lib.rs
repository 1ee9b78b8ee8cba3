//! # msgshield
//!
//! **DLP gateway for customer-support messaging.**
//!
//! msgshield sits between Intercom and its operators: it intercepts inbound
//! conversation messages, scans them for sensitive data (financial,
//! identity, credential, and cryptocurrency-wallet secrets), masks what it
//! finds, optionally blocks delivery, and stores the original content in a
//! restricted vault for authorized review.
//!
//! ## Architecture
//!
//! - **[`dlp`]** — detection engine: pattern catalog, scanner, conflict
//!   resolver, masker, block decision, and the per-message pipeline
//! - **[`gateway`]** — webhook intake, operator JSON API, Intercom client
//! - **[`storage`]** — SQLite message log, findings, vault, and exports
//! - **[`config`]** — TOML configuration with env substitution and hot reload
//! - **[`notification`]** — async notification system (Telegram) for block events
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick Start
//!
//! ```bash
//! # Initialize configuration and database
//! msgshield init
//!
//! # Point Intercom's webhook at the gateway and start it
//! export INTERCOM_ACCESS_TOKEN=...
//! msgshield start
//!
//! # Try the detection engine locally
//! msgshield scan "My SSN is 123-45-6789."
//! ```

pub mod cli;
pub mod config;
pub mod dlp;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod storage;
