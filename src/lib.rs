//! # wirenet
//!
//! An embeddable HTTP/1.x client engine.
//!
//! `wirenet` drives single request/response exchanges over plain TCP or
//! TLS, optionally through an HTTP proxy, and handles the parts of the
//! protocol an application should not have to: response framing, content
//! decoding, redirects and Basic/Digest authentication.
//!
//! ## Features
//!
//! - **Framing**: chunked, `Content-Length` and read-until-close bodies
//! - **Decoding**: gzip, zlib and raw deflate
//! - **Authentication**: Basic and Digest (`auth`, `auth-int`), shared
//!   credential caches, interactive prompts
//! - **Proxies**: absolute-form forwarding and `CONNECT` tunnels with
//!   exception lists
//! - **Connections**: keep-alive reuse, protocol upgrades, cancellation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wirenet::Client;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = Client::new();
//!     let response = client.get("http://example.com/").send().await.unwrap();
//!     println!("Status: {}", response.status());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes and load states
//! - [`http`] - Request serialization, response parsing, auth and decoding
//! - [`socket`] - Transports, buffered streams, proxies and credential caches
//! - [`urlrequest`] - Sessions, redirect and challenge handling
//! - [`client`] - High-level client API

pub mod base;
pub mod client;
pub mod http;
pub mod socket;
pub mod urlrequest;

pub use base::loadstate::LoadState;
pub use base::neterror::NetError;
pub use client::{Client, ClientBuilder, RequestBuilder};
pub use http::{HeaderCollection, HttpResponse, RequestBody};
pub use socket::authcache::CredentialStore;
pub use socket::proxy::{ProxyBuilder, ProxyResolver, ProxySettings};
pub use urlrequest::{ClientConfig, HttpSession, RequestContext};
