pub mod config;
pub mod domain;
pub mod frontend_url;
pub mod http;
pub mod id;
pub mod orders;
pub mod qr;
pub mod state;
pub mod tables;
pub mod version;
