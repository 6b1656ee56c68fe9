pub mod codec;
pub mod envelope;
pub mod framing;

pub use codec::{DecodeError, JsonCodec, WireCodec};
pub use envelope::{ErrorBody, ErrorKind, MessageEnvelope, PayloadKind};
pub use framing::{
    DelimiterFraming, FrameReader, FrameWriter, Framing, LengthPrefixedFraming, LineFraming,
};
