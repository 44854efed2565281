pub mod config;
pub mod errors;
pub mod poem_names;
pub mod poem_store;
pub mod poems_utils;
