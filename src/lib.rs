//! PassForge client: password generation, strength analysis and history
//! against a PassForge server, with an offline caching proxy.

pub mod analytics;
pub mod api;
pub mod cache;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod generator;
pub mod history;
pub mod state;
pub mod storage;
pub mod view;
pub mod workflow;
