pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod repo;
pub mod resource;
