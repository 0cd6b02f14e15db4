pub mod clock;
pub mod config;
pub mod environment;
pub mod errors;
pub mod identity;
pub mod isrc;
pub mod limits;
pub mod normalization;
pub mod routes;
pub mod store;
pub mod urls;
