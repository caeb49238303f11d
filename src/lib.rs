//! Respin News - an RSS reader with AI article respinning
//!
//! This crate aggregates articles from a fixed list of RSS feeds through an
//! RSS-to-JSON conversion API, lets a user filter, search, and save them,
//! and can send an article's title and excerpt through a server-side relay
//! to a generative text API for a reformatted version.

pub mod aggregator;
pub mod config;
pub mod normalizer;
pub mod relay;
pub mod respin;
pub mod routes;
pub mod store;
