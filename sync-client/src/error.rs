//! Client error types.

use storesync_core::CodecError;
use thiserror::Error;

use crate::settings::ConfigError;
use crate::transport::TransportError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The other side never answered a ping. Fatal for the transport
    /// generation; the host must build a new transport to retry.
    #[error("Unable to get a ping response from the other port")]
    HandshakeExhausted {
        /// Number of pings sent.
        attempts: u32,
    },

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The store has been destroyed.
    #[error("store is closed")]
    StoreClosed,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_message_is_stable() {
        let err = ClientError::HandshakeExhausted { attempts: 15 };
        assert_eq!(
            err.to_string(),
            "Unable to get a ping response from the other port"
        );
    }

    #[test]
    fn transport_errors_convert() {
        let err: ClientError = TransportError::Closed.into();
        assert!(matches!(err, ClientError::Transport(TransportError::Closed)));
        assert_eq!(err.to_string(), "transport error: transport closed");
    }
}
