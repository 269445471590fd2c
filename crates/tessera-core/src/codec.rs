use thiserror::Error;

use crate::tx::Tx;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode transaction with {codec}: {reason}")]
    Decode { codec: &'static str, reason: String },

    #[error("failed to encode transaction with {codec}: {reason}")]
    Encode { codec: &'static str, reason: String },
}

/// Wire format for transactions. Each protocol version owns one.
pub trait TxCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode_tx(&self, bytes: &[u8]) -> Result<Tx, CodecError>;

    fn encode_tx(&self, tx: &Tx) -> Result<Vec<u8>, CodecError>;
}
