//! Courtbook library
//!
//! This library exposes the core booking functionality of Courtbook for
//! testing and for embedding in other services.

pub mod config;
pub mod database;
pub mod error;
pub mod mail;
pub mod services;
