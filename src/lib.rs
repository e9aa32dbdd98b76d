pub mod api;
pub mod config;
pub mod db;
pub mod object_store;
pub mod photos;
pub mod planner;
pub mod seed;
pub mod snapshot;
pub mod store;
pub mod targets;
