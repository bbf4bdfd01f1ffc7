//! snakeserve serves snake-species classification predictions from a
//! pretrained ResNet-50 behind a small HTTP API: the weights are loaded once
//! at startup and one stateless prediction route does the rest.

pub mod classifier;
pub mod config;
pub mod server;
