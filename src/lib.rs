//! # navgate
//!
//! **Per-navigation access control.**
//!
//! navgate decides, for every navigation attempt it is shown, whether to
//! allow, block, redirect, or close the originating tab — based on
//! blacklist/whitelist rules, an optional time/day schedule, and short-lived
//! per-host overrides.
//!
//! ## Architecture
//!
//! - **[`policy`]** — rule compilation, schedule gate, temporary overrides,
//!   and the decision engine itself
//! - **[`host`]** — the injected execution-host capability and effect types
//! - **[`control`]** — name-based operation dispatch for the configuration
//!   surface (fixed allow-list)
//! - **[`store`]** — TOML settings persistence with hot reload
//! - **[`audit`]** — SQLite-backed decision log with JSON/CSV export
//! - **[`web`]** — HTTP control API (axum) with an SSE decision stream
//! - **[`cli`]** — command-line interface (clap)
//! - **[`error`]** — unified error types using `thiserror`
//!
//! ## Quick start
//!
//! ```bash
//! # Create a settings file and the decision database
//! navgate init
//!
//! # Run the engine with the control API
//! navgate start
//!
//! # Evaluate a URL against the active settings
//! navgate check https://www.example.com/
//! ```

pub mod audit;
pub mod cli;
pub mod control;
pub mod error;
pub mod host;
pub mod policy;
pub mod store;
pub mod web;
