// Transaction wire formats of the bundled versions

use tessera_core::{CodecError, Tx, TxCodec};

/// Compact binary encoding used by version 0
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeTxCodec;

impl TxCodec for BincodeTxCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn decode_tx(&self, bytes: &[u8]) -> Result<Tx, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn encode_tx(&self, tx: &Tx) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(tx).map_err(|e| CodecError::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}

/// JSON encoding used from version 1 onwards
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTxCodec;

impl TxCodec for JsonTxCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn decode_tx(&self, bytes: &[u8]) -> Result<Tx, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn encode_tx(&self, tx: &Tx) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(tx).map_err(|e| CodecError::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}
