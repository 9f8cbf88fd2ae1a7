//! AI website builder: describe a site, watch the markup stream in,
//! publish it as a static space.
//!
//! The crate is a thin HTTP service around three pipelines. Generation
//! turns a prompt (plus optional prior context) into a streamed HTML
//! document through a pluggable inference provider. Deployment publishes
//! a finished document as a public static space on the artifact hub.
//! Remix pulls a published space back in as fresh generation context.

pub mod config;
pub mod deploy;
pub mod error;
pub mod generate;
pub mod hub;
pub mod llm;
pub mod providers;
pub mod quota;
pub mod remix;
pub mod server;
pub mod web;
