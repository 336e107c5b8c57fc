mod client;
pub mod models;

pub use client::{SESSION_HEADER, VapiClient};
