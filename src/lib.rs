pub mod bands;
pub mod commands;
pub mod config;
pub mod context;
pub mod database;
pub mod diagnostics;
pub mod error;
pub mod features;
pub mod forecaster;
pub mod fred;
pub mod http_client;
pub mod indicators;
pub mod models;
pub mod providers;
pub mod ridge;
pub mod standardizer;
pub mod trainer;
pub mod yahoo;
