//! End-to-end tests for rowgate.
//!
//! `pipeline` runs the worker over decoded wal2json lines with an
//! in-memory oracle. `pgsql` needs a PostgreSQL server with wal2json and
//! is `#[ignore]`d; run it with `cargo test -- --ignored` once
//! `ROWGATE_SOURCE__CONNECTION_STRING` is set (or `env/.env` provides it).

mod fixtures;
mod pgsql;
mod pipeline;
