//! Integration tests - queries running through the whole pipeline
//!
//! These tests compose destination-typed queries, translate them, execute
//! them against in-memory (or mocked) sources and check the mapped results.

mod fixtures;

mod async_query_tests;
mod equivalence_tests;
mod failure_tests;
mod hook_tests;
mod query_scenarios;
mod yaml_pipeline_tests;
