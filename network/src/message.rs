//! The eight-variant peer message protocol.
//!
//! Wire format is a UTF-8 JSON object with top-level keys `type` and
//! (when the variant carries a payload) `data`. `serde`'s adjacently
//! tagged representation produces exactly that shape for free, so the
//! codec is this enum plus two thin functions — no hand-rolled framing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quorumchain_core::{Block, Transaction};

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebroadcastData {
    pub host: String,
    pub port: u16,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainData {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectData {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    Tx(Transaction),
    Block(Block),
    Rebroadcast(RebroadcastData),
    FinalizeBlock(Block),
    RequestChain,
    Chain(ChainData),
    Mining,
    Disconnect(DisconnectData),
}

/// Any field required by the grammar in the wire format that is missing
/// decodes to an error here; callers log and discard per the decode
/// error policy, they never propagate it.
pub fn decode(data: &str) -> Result<Message, MessageError> {
    Ok(serde_json::from_str(data)?)
}

pub fn encode(message: &Message) -> Result<String, MessageError> {
    Ok(serde_json::to_string(message)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorumchain_core::Block;

    #[test]
    fn request_chain_and_mining_carry_no_data_field() {
        let encoded = encode(&Message::RequestChain).unwrap();
        assert_eq!(encoded, r#"{"type":"request_chain"}"#);
        let encoded = encode(&Message::Mining).unwrap();
        assert_eq!(encoded, r#"{"type":"mining"}"#);
    }

    #[test]
    fn tx_round_trips() {
        let msg = Message::Tx(Transaction::coinbase("alice", 50, 1));
        let encoded = encode(&msg).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn block_round_trips() {
        let msg = Message::Block(Block::genesis());
        let encoded = encode(&msg).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn chain_round_trips() {
        let msg = Message::Chain(ChainData { blocks: vec![Block::genesis()] });
        let encoded = encode(&msg).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn disconnect_uses_host_and_port_fields() {
        let msg = Message::Disconnect(DisconnectData { host: "10.0.0.1".to_string(), port: 9001 });
        let encoded = encode(&msg).unwrap();
        assert!(encoded.contains(r#""host":"10.0.0.1""#));
        assert!(encoded.contains(r#""port":9001"#));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(decode("not json").is_err());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert!(decode(r#"{"type":"nonsense"}"#).is_err());
    }
}
