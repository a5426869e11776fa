pub mod cache;
pub mod config;
pub mod domain;
pub mod email_client;
pub mod error;
pub mod newsletter_client;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod templates;
