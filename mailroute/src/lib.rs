//! Command-line front end for mailroute endpoint discovery.

pub mod commands;
pub mod config;
