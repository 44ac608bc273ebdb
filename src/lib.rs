//! Asha Field reference sync server.

pub mod server;
