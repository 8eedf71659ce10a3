pub mod client;
pub mod protocol;
pub mod server;

pub use client::ServiceClient;
pub use protocol::{Request, Response};
pub use server::Service;
