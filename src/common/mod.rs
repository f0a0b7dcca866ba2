pub mod clock;
pub mod config;
pub mod delay;
pub mod error;
