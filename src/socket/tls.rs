use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};

/// TLS settings applied when a connection is promoted.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    /// This engine only speaks HTTP/1.x, so only `http/1.1` is offered.
    pub alpn_protos: Vec<String>,
    /// Verify the peer's certificate chain and hostname.
    pub verify_peer: bool,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            alpn_protos: vec!["http/1.1".to_string()],
            verify_peer: true,
        }
    }
}

impl TlsConfig {
    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder
                .set_min_proto_version(Some(min))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = self.max_version {
            builder
                .set_max_proto_version(Some(max))
                .map_err(|_| NetError::SslProtocolError)?;
        }

        if !self.alpn_protos.is_empty() {
            builder
                .set_alpn_protos(&Self::alpn_wire(&self.alpn_protos)?)
                .map_err(|_| NetError::SslProtocolError)?;
        }

        builder.set_verify(if self.verify_peer {
            SslVerifyMode::PEER
        } else {
            SslVerifyMode::NONE
        });
        Ok(())
    }

    /// Build a connector with this configuration.
    pub fn connector(&self) -> Result<SslConnector, NetError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
        self.apply_to_builder(&mut builder)?;
        Ok(builder.build())
    }

    /// Length-prefixed ALPN protocol list.
    fn alpn_wire(protos: &[String]) -> Result<Vec<u8>, NetError> {
        let mut wire = Vec::new();
        for proto in protos {
            let len = u8::try_from(proto.len()).map_err(|_| NetError::SslProtocolError)?;
            wire.push(len);
            wire.extend_from_slice(proto.as_bytes());
        }
        Ok(wire)
    }

    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<std::net::IpAddr>()
            .is_err()
    }
}
