//! Cigar-butt screener for mainland A-shares.
//!
//! Pulls paginated quotes from Sina, normalises them, optionally joins them
//! against a cached symbol directory and screens the result on PB / PE /
//! market cap. Every surface (one-shot scan, interactive session) goes
//! through [`pipeline::Pipeline::run_analysis`].

pub mod config;
pub mod engine;
pub mod market_data;
pub mod persist;
pub mod pipeline;
pub mod telemetry;
