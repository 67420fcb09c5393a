//! Unit tests - public API edge cases without a full query pipeline

mod config_tests;
mod expression_language_tests;
mod translation_tests;
