//! # JSON <-> Protobuf Codec
//!
//! ## How it works
//!
//! 1. **Encoding (JSON -> Proto)**:
//!    - Takes a `serde_json::Value`.
//!    - Uses `prost_reflect::DynamicMessage` to validate the JSON against the `MessageDescriptor`.
//!    - Serializes the valid message into Protobuf bytes.
//!
//! 2. **Decoding (Proto -> JSON)**:
//!    - Decodes raw bytes into a `DynamicMessage` using the `MessageDescriptor`.
//!    - Converts the message back into a plain `serde_json::Value`.
//!
//! [`BytesCodec`] is the `tonic::codec::Codec` used on the wire. It moves already encoded
//! bytes in both directions, leaving all schema work to [`MessageCodec`].
use crate::config::CodecOptions;
use crate::error::{Categorized, ErrorKind};
use bytes::{Buf, BufMut, Bytes};
use prost::Message;
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, SerializeOptions};
use serde_json::Value;
use std::borrow::Cow;
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON structure does not match Protobuf schema '{message_type}': {source}")]
    Encode {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode Protobuf bytes as '{message_type}': {source}")]
    Decode {
        message_type: String,
        #[source]
        source: prost::DecodeError,
    },
    #[error("Failed to map '{message_type}' to JSON: {source}")]
    ToJson {
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Categorized for CodecError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::CodecError
    }
}

/// Converts between JSON values and the binary encoding of one message type.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    descriptor: MessageDescriptor,
    options: CodecOptions,
}

impl MessageCodec {
    pub fn new(descriptor: MessageDescriptor, options: CodecOptions) -> Self {
        Self {
            descriptor,
            options,
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.descriptor
    }

    /// Fully qualified name of the message type.
    pub fn message_type(&self) -> &str {
        self.descriptor.full_name()
    }

    /// Validates `value` against the message type and coerces it into a message.
    ///
    /// A JSON string holding an object (as typed into an editor) is parsed first.
    pub fn to_message(&self, value: &Value) -> Result<DynamicMessage, CodecError> {
        let value = parse_embedded_object(value);
        let options = DeserializeOptions::new().deny_unknown_fields(self.options.deny_unknown_fields);

        DynamicMessage::deserialize_with_options(self.descriptor.clone(), value.as_ref(), &options)
            .map_err(|source| CodecError::Encode {
                message_type: self.message_type().to_string(),
                source,
            })
    }

    /// Encodes `value` into Protobuf bytes.
    pub fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        let message = self.to_message(value)?;
        Ok(Bytes::from(message.encode_to_vec()))
    }

    /// Decodes Protobuf bytes into a plain JSON value.
    pub fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let message = DynamicMessage::decode(self.descriptor.clone(), bytes).map_err(|source| {
            CodecError::Decode {
                message_type: self.message_type().to_string(),
                source,
            }
        })?;

        self.to_json(&message)
    }

    fn to_json(&self, message: &DynamicMessage) -> Result<Value, CodecError> {
        let options = SerializeOptions::new()
            .use_proto_field_name(self.options.use_proto_field_names)
            .skip_default_fields(!self.options.emit_default_fields);

        message
            .serialize_with_options(serde_json::value::Serializer, &options)
            .map_err(|source| CodecError::ToJson {
                message_type: self.message_type().to_string(),
                source,
            })
    }
}

fn parse_embedded_object(value: &Value) -> Cow<'_, Value> {
    if let Value::String(text) = value
        && let Ok(parsed @ Value::Object(_)) = serde_json::from_str::<Value>(text)
    {
        return Cow::Owned(parsed);
    }
    Cow::Borrowed(value)
}

/// A `tonic` codec that carries pre-encoded Protobuf bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Codec for BytesCodec {
    type Encode = Bytes;
    type Decode = Bytes;

    type Encoder = BytesEncoder;
    type Decoder = BytesDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        BytesEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        BytesDecoder
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytesEncoder;

impl Encoder for BytesEncoder {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        dst.put(item);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining())))
    }
}
