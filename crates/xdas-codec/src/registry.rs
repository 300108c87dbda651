//! Keyspace to message-codec mapping.
//!
//! Each keyspace whose payloads carry a typed content format registers a
//! codec that can decode and re-encode the payload as protobuf or JSON.
//! The registry is populated at startup and read-only afterwards.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::magicbyte::{CONTENT_TYPE_JSON, CONTENT_TYPE_PROTOBUF};

/// Marshalling seam between raw payload bytes and the keyspace's typed
/// message. The typed value never leaves the codec.
pub trait MessageCodec: Send + Sync {
    /// Decodes `data` as the given content type, discarding the result.
    fn validate(&self, ctv: u8, data: &[u8]) -> Result<(), CodecError>;

    /// Decodes `data` from `in_ctv` and re-encodes it as `out_ctv`.
    fn transcode(&self, in_ctv: u8, out_ctv: u8, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// [`MessageCodec`] backed by a prost message that also serialises as
/// camelCase JSON. Unknown JSON fields are discarded on parse.
pub struct ProstCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProstCodec<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ProstCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ProstCodec<T>
where
    T: prost::Message + Default + Serialize + DeserializeOwned,
{
    fn decode(&self, ctv: u8, data: &[u8]) -> Result<T, CodecError> {
        match ctv {
            CONTENT_TYPE_PROTOBUF => Ok(T::decode(data)?),
            CONTENT_TYPE_JSON => Ok(serde_json::from_slice(data)?),
            other => Err(CodecError::UnknownContentType(other)),
        }
    }

    fn encode(&self, ctv: u8, message: &T) -> Result<Vec<u8>, CodecError> {
        match ctv {
            CONTENT_TYPE_PROTOBUF => Ok(message.encode_to_vec()),
            CONTENT_TYPE_JSON => Ok(serde_json::to_vec(message)?),
            other => Err(CodecError::UnknownContentType(other)),
        }
    }
}

impl<T> MessageCodec for ProstCodec<T>
where
    T: prost::Message + Default + Serialize + DeserializeOwned,
{
    fn validate(&self, ctv: u8, data: &[u8]) -> Result<(), CodecError> {
        self.decode(ctv, data).map(|_| ())
    }

    fn transcode(&self, in_ctv: u8, out_ctv: u8, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let message = self.decode(in_ctv, data)?;
        self.encode(out_ctv, &message)
    }
}

/// Keyspace name to codec map, built once at startup.
#[derive(Default)]
pub struct MessageRegistry {
    codecs: HashMap<String, Arc<dyn MessageCodec>>,
}

impl MessageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the message type for a keyspace.
    pub fn register<T>(&mut self, keyspace: impl Into<String>)
    where
        T: prost::Message + Default + Serialize + DeserializeOwned + 'static,
    {
        self.codecs
            .insert(keyspace.into(), Arc::new(ProstCodec::<T>::new()));
    }

    #[must_use]
    pub fn get(&self, keyspace: &str) -> Option<Arc<dyn MessageCodec>> {
        self.codecs.get(keyspace).cloned()
    }

    #[must_use]
    pub fn contains(&self, keyspace: &str) -> bool {
        self.codecs.contains_key(keyspace)
    }

    /// Registered keyspace names.
    pub fn keyspaces(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}
