pub mod catalog;
pub mod config;
pub mod errors;
pub mod generation;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod util;
