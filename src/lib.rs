//! Palaver - A lightweight discussion board
//!
//! This library provides the core functionality for the Palaver forum.

pub mod api;
pub mod config;
pub mod db;
pub mod forms;
pub mod models;
pub mod services;
pub mod templates;
