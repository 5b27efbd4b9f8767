//! End-to-end tests for the asset pack controller.

mod build_tests;
mod common;
mod fallback_tests;
mod purge_tests;
