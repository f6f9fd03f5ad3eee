//! HTTP/1.x protocol handling.
//!
//! - [`headercollection`]: ordered, multi-valued headers
//! - [`authchallenge`], [`digestauth`], [`auth`]: challenges and credentials
//! - [`requestbuilder`]: wire-format requests
//! - [`responseparser`], [`chunked`], [`contentdecoder`]: response framing
//!   and decoding
//! - [`transaction`]: one request/response exchange

pub mod auth;
pub mod authchallenge;
pub mod chunked;
pub mod contentdecoder;
pub mod digestauth;
pub mod headercollection;
pub mod requestbody;
pub mod requestbuilder;
pub mod response;
pub mod responseparser;
pub mod transaction;

pub use headercollection::HeaderCollection;
pub use requestbody::RequestBody;
pub use response::HttpResponse;
