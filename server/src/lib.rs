pub mod core;
pub mod data;
pub mod domain;
pub mod utils;

mod app;
