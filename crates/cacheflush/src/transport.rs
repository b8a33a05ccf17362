//! Runtime context handed to sender factories.
//!
//! The flush never talks to the network itself. Whatever delivers envelopes
//! is supplied by the host application as an [`EnvelopeTransport`] and carried
//! to the factory inside a [`FlushContext`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Opaque unit of persisted telemetry awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    name: String,
    payload: Vec<u8>,
}

impl Envelope {
    /// Wraps a payload read from the cache under the given file name.
    #[must_use]
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Cache file name the envelope was read from.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Raw serialised bytes, passed through untouched.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        self.payload.as_slice()
    }
}

/// Error reported when a transport rejects an envelope.
#[derive(Debug, Error)]
#[error("transport rejected envelope {envelope}: {message}")]
pub struct TransportError {
    envelope: String,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    /// Builds an error without an underlying source.
    #[must_use]
    pub fn new(envelope: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            envelope: envelope.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Builds an error wrapping the transport's own failure.
    #[must_use]
    pub fn with_source(
        envelope: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            envelope: envelope.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Name of the envelope that could not be delivered.
    #[must_use]
    pub fn envelope(&self) -> &str {
        self.envelope.as_str()
    }
}

/// Delivers a single envelope. Blocking from the caller's point of view.
pub trait EnvelopeTransport: Send + Sync {
    /// Sends the envelope, returning once the transport accepted or rejected it.
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError>;
}

impl<T> EnvelopeTransport for Arc<T>
where
    T: EnvelopeTransport + ?Sized,
{
    fn send_envelope(&self, envelope: &Envelope) -> Result<(), TransportError> {
        (**self).send_envelope(envelope)
    }
}

/// Runtime context passed through `register` to the sender factory.
#[derive(Clone)]
pub struct FlushContext {
    transport: Arc<dyn EnvelopeTransport>,
}

impl FlushContext {
    /// Builds a context over the host's transport.
    #[must_use]
    pub fn new(transport: Arc<dyn EnvelopeTransport>) -> Self {
        Self { transport }
    }

    /// Shared handle to the transport.
    #[must_use]
    pub fn transport(&self) -> Arc<dyn EnvelopeTransport> {
        Arc::clone(&self.transport)
    }
}

impl fmt::Debug for FlushContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("FlushContext").finish_non_exhaustive()
    }
}
