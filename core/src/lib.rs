pub mod db;
pub mod error;
pub mod export;
pub mod fodmap;
pub mod migrations;
pub mod models;
pub mod openfoodfacts;
pub mod reducer;
pub mod registry;
pub mod service;
pub mod stats;
