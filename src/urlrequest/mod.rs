//! Sessions, configuration, and the redirect/auth loop.

pub mod context;
pub mod job;
pub mod request;
pub mod session;

pub use context::{ClientConfig, RequestContext};
pub use request::HttpSession;
