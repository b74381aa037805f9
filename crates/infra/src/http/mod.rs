//! Plain HTTP transport shared by the auth endpoint and the API client.

pub mod client;

pub use client::{join_url, HttpClient, HttpClientBuilder};
