// ABOUTME: Library crate for hubshell exposing the hub, the providers and the terminal for testing and reuse

pub mod app;
pub mod components;
pub mod config;
pub mod error;
pub mod hub;
pub mod providers;
pub mod services;
pub mod terminal;
