mod catalog_routes;
pub mod config;
mod http_layers;
mod playlist_routes;
pub mod server;
pub(self) mod session;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub(self) use catalog_routes::make_catalog_routes;
pub(self) use playlist_routes::make_playlist_routes;
pub use server::{make_app, run_server};
