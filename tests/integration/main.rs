//! Integration tests for the crawler and announcer
//!
//! The handoff tests drive both roles against one on-disk database through
//! separate connections, with in-memory fakes for the catalog and the
//! delivery channel. The HTTP tests run the real catalog reader against a
//! wiremock server.

mod common;
mod handoff_tests;
mod http_tests;
