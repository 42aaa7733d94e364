//! Transparent HTTP reverse proxy that records traffic as imposter fixtures.
//!
//! Requests are forwarded to a backend unchanged; each completed exchange is
//! queued on a bounded channel and merged by a single recorder task into
//! `<imposters-dir>/<host>/<path>/imposters.json`.

pub mod app;
pub mod capture;
pub mod config;
pub mod proxy;
pub mod recording;
