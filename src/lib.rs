//! Sentinel-2 tile retrieval from the public Google Cloud bucket.
//!
//! A product id is decoded into its tile coordinates, the tile manifest is
//! read from the bucket, and every listed band file is downloaded into
//! `{target}/{product_id}.SAFE/`.

pub mod app;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod location;
pub mod manifest;
pub mod output;
pub mod retry;

#[cfg(test)]
mod test_support;
