pub mod auth;
pub mod calculator;
pub mod day;
pub mod db;
pub mod error;
pub mod health;
pub mod health_import;
pub mod models;
pub mod service;
pub mod summary_job;
