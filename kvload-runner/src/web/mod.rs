//! The metrics and health webserver.
//!
//! [`App`] sets up routing and middleware. Open a TCP listener with [`listen`] and pass it to
//! [`App::serve`] to accept connections.

mod app;
mod server;

pub use app::App;
pub use server::listen;
