pub mod config;
pub mod content;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod media;
pub mod sample_buffer;
pub mod settings;
pub mod state;
pub mod target;
