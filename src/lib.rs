pub mod app;
pub mod config;
pub mod data;
pub mod extractor;
pub mod fetch;
pub mod ledger;
pub mod web;
