//! CouchDB-style document store client for the firth uploader
//!
//! Implements the `uplink::DocumentStore` contract over HTTP: measurement
//! records are saved through a design-document update handler (so the server
//! stamps each document on insert), and segment files are uploaded as
//! attachments of the saved document.

pub mod client;
pub mod config;

pub use client::CouchClient;
pub use config::StoreConfig;
