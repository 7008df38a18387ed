#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod risk;
pub mod utils;
