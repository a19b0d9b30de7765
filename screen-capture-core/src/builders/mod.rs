pub mod config_builder;
pub mod filter_builder;
