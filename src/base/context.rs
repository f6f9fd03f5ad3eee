//! Ergonomic error context helpers.
//!
//! Provides extension traits for adding context to `Result` types,
//! converting IO errors into `NetError` variants while logging the
//! endpoint or phase that failed.

use crate::base::neterror::NetError;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use wirenet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Add DNS resolution context to an IO error.
    fn dns_context(self, domain: &str) -> Result<T, NetError>;

    /// Map a failed socket read.
    fn read_context(self) -> Result<T, NetError>;

    /// Map a failed socket write.
    fn write_context(self) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(host = %host, port, error = %e, "connect failed");
            match NetError::from_io(&e) {
                NetError::ConnectionRefused => NetError::ConnectionRefused,
                NetError::ConnectionTimedOut => NetError::ConnectionTimedOut,
                _ => NetError::ConnectionFailed,
            }
        })
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(domain = %domain, error = %e, "name resolution failed");
            NetError::NameNotResolved
        })
    }

    fn read_context(self) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(error = %e, "socket read failed");
            NetError::from_io(&e)
        })
    }

    fn write_context(self) -> Result<T, NetError> {
        self.map_err(|e| {
            tracing::debug!(error = %e, "socket write failed");
            NetError::from_io(&e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_connection_context() {
        let result: Result<(), io::Error> =
            Err(Error::new(ErrorKind::ConnectionRefused, "refused"));
        let err = result.connection_context("example.com", 443).unwrap_err();
        assert_eq!(err, NetError::ConnectionRefused);

        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::Other, "weird"));
        let err = result.connection_context("example.com", 443).unwrap_err();
        assert_eq!(err, NetError::ConnectionFailed);
    }

    #[test]
    fn test_dns_context() {
        let result: Result<(), io::Error> = Err(Error::new(ErrorKind::NotFound, "no such host"));
        let err = result.dns_context("unknown.example.com").unwrap_err();
        assert_eq!(err, NetError::NameNotResolved);
    }

    #[test]
    fn test_read_context_reset() {
        let result: Result<usize, io::Error> = Err(Error::new(ErrorKind::ConnectionReset, "rst"));
        assert_eq!(result.read_context().unwrap_err(), NetError::ConnectionReset);
    }
}
