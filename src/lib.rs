// src/lib.rs

//! Property Monitor Library
//!
//! Scrapes rental listing sites, diffs listings against stored state and
//! notifies about new or repriced listings within budget.

pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
