//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the retailers and drive the
//! fetcher, the site-A HTTP levels and the full orchestration pipeline.

mod bringo;
mod fetcher;
mod pipeline;
