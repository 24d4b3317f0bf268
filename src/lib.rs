//! Waypost is an HTTP reverse proxy and lightweight API gateway.
//!
//! Each configured route forwards matching requests to a backend chosen
//! either by static round robin over an upstream group or through a
//! self-registering discovery registry whose instances are health-checked
//! by a background TCP heartbeat. Routes can add security and CORS
//! response headers, custom outbound headers, and the caller's IP. An
//! optional whitelist of IPs and CIDR blocks guards every path.
//!
//! # Architecture
//!
//! - [`access`] -- IP whitelist guard and caller-IP resolution.
//! - [`balancer`] -- Static round-robin backend lists.
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Configuration model, validation, and the
//!   [`ConfigSource`](config::ConfigSource) trait (file or URL).
//! - [`discovery`] -- Service registry, `POST /discovery` registration, and
//!   the heartbeat task.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Core HTTP forwarding: path translation, header policy,
//!   backend selection, and the forwarding handler.
//! - [`server`] -- Axum router construction, shared application state, HTTP
//!   client, and graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support (default) |
//! | `toml` | TOML config file support |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod access;
pub mod balancer;
pub mod cli;
pub mod cmd;
pub mod config;
pub mod discovery;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
