//! Socket and connection management.
//!
//! Mirrors the parts of Chromium's `net/socket/` a single-connection client
//! needs:
//! - [`transport`]: TCP connect and in-place TLS promotion
//! - [`bufferedstream`]: line/exact reads over one shared buffer
//! - [`connection`]: routing, reuse and CONNECT tunneling
//! - [`proxy`]: HTTP proxy settings and exception lists
//! - [`authcache`]: origin and proxy credential caches

pub mod authcache;
pub mod bufferedstream;
pub mod connection;
pub mod matcher;
pub mod proxy;
pub mod stream;
pub mod tls;
pub mod transport;
