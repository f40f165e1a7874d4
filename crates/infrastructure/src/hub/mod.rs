pub mod client;

pub use client::WsHubClient;
