//! Library crate for duoplay-back, exposing modules for binaries and integration tests.

pub mod config;
pub mod dao;
pub mod dto;
pub mod engine;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
