pub mod connection;
pub mod credentials;
pub mod errors;
pub mod export;
pub mod ops;
pub mod pads;
pub mod progress;
pub mod scrape;
pub mod session;
pub mod web;
