//! Fieldtrip - free museum activity aggregation and crawling system.
//!
//! Fetches event listings from museum websites, extracts and normalizes
//! activity records, and upserts them into a local SQLite database.

pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod server;
pub mod services;
