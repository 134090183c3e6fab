pub mod config;
pub mod score;
pub mod serve;
