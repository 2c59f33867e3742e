//! LabDesk Library
//!
//! Client-side core of the laboratory services desk: the parameter catalog,
//! selection baskets, the request and quotation lifecycle, result recording
//! and the quotation document, all talking to the laboratory REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;

pub use client::{HttpLabApi, InMemoryLabApi, LabApi};
pub use errors::ServiceError;
pub use services::LabServices;
