//! CRM Agent Actions Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod calls;
pub mod config;
pub mod error;
pub mod llm;
/// Application state shared by request handlers
pub mod state;
