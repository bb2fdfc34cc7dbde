//! Live user feed: a small user API whose mutations are pushed to every
//! connected WebSocket client.
//!
//! - [`event`] defines the mutation event and its `{action, data}` wire shape.
//! - [`registry`] tracks live subscribers behind its own lock and hands out
//!   copy-on-read snapshots.
//! - [`coordinator`] fans one event out to a snapshot, concurrently, and drops
//!   subscribers whose delivery fails or times out.
//! - [`store`] is the record store adapter plus an in-memory implementation.
//! - [`api`] holds the axum routes: the CRUD endpoints with their response
//!   envelope and the `/ws` subscription endpoint.
//! - [`server`] binds the router to a listener with graceful shutdown.
//! - [`cli`], [`config`] and [`client`] cover the command line, runtime knobs
//!   and the terminal `watch` subscriber.

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod registry;
pub mod server;
pub mod store;
