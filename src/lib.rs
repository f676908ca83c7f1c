// Library exports for wfresh, shared by the binary and the integration tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod dishes;
pub mod error;
pub mod extractors;
pub mod feast;
pub mod forum;
pub mod menu;
pub mod routes;
pub mod state;
