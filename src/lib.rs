//! # HID+ Bridge Library
//!
//! Drive a virtual game controller from UDP commands on a local network.
//!
//! This library provides the core of the service: the virtual device session,
//! the shared controller state, the command ingestion worker that writes it,
//! the periodic publisher that forwards it to the platform, and a best-effort
//! diagnostics log usable from any of them.

pub mod config;
pub mod controller;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod ingest;
pub mod protocol;
pub mod publisher;
pub mod service;
