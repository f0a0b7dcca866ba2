pub mod broadcast;
pub mod common;
pub mod network;
