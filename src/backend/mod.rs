pub mod client;
pub mod poller;

pub use client::BackendClient;
pub use poller::ConnectionPoller;
