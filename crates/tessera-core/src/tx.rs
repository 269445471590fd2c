// Transactions and message sum types
//
// A transaction carries one signer. Every message in it must name that
// signer, which the ante handlers check before any message runs.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::coins::DecCoins;
use crate::error::AppError;
use crate::gov::ProposalContent;

pub const ROUTE_BANK: &str = "bank";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Io {
    pub address: Address,
    pub coins: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BankMsg {
    Send {
        from: Address,
        to: Address,
        amount: DecCoins,
    },
    MultiSend {
        inputs: Vec<Io>,
        outputs: Vec<Io>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgSubmitProposal {
    pub content: ProposalContent,
    pub initial_deposit: DecCoins,
    pub proposer: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteOption {
    Yes,
    No,
    Abstain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovMsg {
    SubmitProposal(MsgSubmitProposal),
    Vote {
        proposal_id: u64,
        voter: Address,
        option: VoteOption,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    Bank(BankMsg),
    Gov(GovMsg),
}

impl Msg {
    /// Router key of the module that handles this message
    pub fn route(&self) -> &'static str {
        match self {
            Msg::Bank(_) => ROUTE_BANK,
            Msg::Gov(_) => crate::gov::ROUTE_GOV,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Bank(BankMsg::Send { .. }) => "send",
            Msg::Bank(BankMsg::MultiSend { .. }) => "multi_send",
            Msg::Gov(GovMsg::SubmitProposal(_)) => "submit_proposal",
            Msg::Gov(GovMsg::Vote { .. }) => "vote",
        }
    }

    pub fn signers(&self) -> Vec<&Address> {
        match self {
            Msg::Bank(BankMsg::Send { from, .. }) => vec![from],
            Msg::Bank(BankMsg::MultiSend { inputs, .. }) => inputs.iter().map(|i| &i.address).collect(),
            Msg::Gov(GovMsg::SubmitProposal(m)) => vec![&m.proposer],
            Msg::Gov(GovMsg::Vote { voter, .. }) => vec![voter],
        }
    }

    /// Stateless checks
    pub fn validate_basic(&self) -> Result<(), AppError> {
        match self {
            Msg::Bank(BankMsg::Send { from, to, amount }) => {
                if from.is_empty() || to.is_empty() {
                    return Err(AppError::invalid_address("missing sender or recipient"));
                }
                if amount.is_empty() {
                    return Err(AppError::invalid_coins("send amount must be positive"));
                }
                Ok(())
            }
            Msg::Bank(BankMsg::MultiSend { inputs, outputs }) => {
                if inputs.is_empty() || outputs.is_empty() {
                    return Err(AppError::invalid_request("multi-send needs inputs and outputs"));
                }
                let total_in = inputs.iter().fold(DecCoins::default(), |acc, i| acc.add(&i.coins));
                let total_out = outputs.iter().fold(DecCoins::default(), |acc, o| acc.add(&o.coins));
                if total_in != total_out {
                    return Err(AppError::invalid_coins(format!(
                        "inputs {} do not match outputs {}",
                        total_in, total_out
                    )));
                }
                Ok(())
            }
            Msg::Gov(GovMsg::SubmitProposal(m)) => {
                if m.proposer.is_empty() {
                    return Err(AppError::invalid_address("missing proposer"));
                }
                if m.content.title().trim().is_empty() {
                    return Err(AppError::invalid_request("proposal title cannot be blank"));
                }
                Ok(())
            }
            Msg::Gov(GovMsg::Vote { voter, .. }) => {
                if voter.is_empty() {
                    return Err(AppError::invalid_address("missing voter"));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub msgs: Vec<Msg>,
    pub fee: DecCoins,
    pub memo: String,
    /// Account sequence; only checked by protocols that track sequences
    pub sequence: u64,
}

#[derive(Serialize)]
struct SignDoc<'a> {
    chain_id: &'a str,
    body: &'a TxBody,
}

/// Canonical bytes a signer commits to
pub fn sign_bytes(chain_id: &str, body: &TxBody) -> Result<Vec<u8>, AppError> {
    Ok(serde_json::to_vec(&SignDoc { chain_id, body })?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub pub_key: Vec<u8>,
    pub signature: Vec<u8>,
}

impl Tx {
    pub fn sign(body: TxBody, chain_id: &str, key: &SigningKey) -> Result<Self, AppError> {
        let bytes = sign_bytes(chain_id, &body)?;
        let signature = key.sign(&bytes);
        Ok(Tx {
            body,
            pub_key: key.verifying_key().as_bytes().to_vec(),
            signature: signature.to_bytes().to_vec(),
        })
    }

    fn verifying_key(&self) -> Result<VerifyingKey, AppError> {
        let raw: [u8; 32] = self
            .pub_key
            .as_slice()
            .try_into()
            .map_err(|_| AppError::unauthorized("public key must be 32 bytes"))?;
        VerifyingKey::from_bytes(&raw).map_err(|e| AppError::unauthorized(format!("invalid public key: {}", e)))
    }

    /// Address derived from the attached public key, without checking the signature
    pub fn signer(&self) -> Result<Address, AppError> {
        Ok(Address::from_pubkey(&self.verifying_key()?))
    }

    /// Checks the signature over the sign bytes for `chain_id` and returns the signer
    pub fn verify(&self, chain_id: &str) -> Result<Address, AppError> {
        let key = self.verifying_key()?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|e| AppError::unauthorized(format!("malformed signature: {}", e)))?;
        let bytes = sign_bytes(chain_id, &self.body)?;
        key.verify(&bytes, &signature)
            .map_err(|_| AppError::unauthorized("signature verification failed"))?;
        Ok(Address::from_pubkey(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(from: &Address) -> TxBody {
        TxBody {
            msgs: vec![Msg::Bank(BankMsg::Send {
                from: from.clone(),
                to: Address::from_raw("bob"),
                amount: DecCoins::parse("5tsr").unwrap(),
            })],
            fee: DecCoins::parse("1tsr").unwrap(),
            memo: String::new(),
            sequence: 0,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let signer = Address::from_pubkey(&key.verifying_key());
        let tx = Tx::sign(body(&signer), "tessera-test", &key).unwrap();

        assert_eq!(tx.verify("tessera-test").unwrap(), signer);
        assert!(tx.verify("other-chain").is_err());
    }

    #[test]
    fn test_tampered_body_rejected() {
        let key = SigningKey::from_bytes(&[3u8; 32]);
        let signer = Address::from_pubkey(&key.verifying_key());
        let mut tx = Tx::sign(body(&signer), "tessera-test", &key).unwrap();
        tx.body.memo = "changed".to_string();
        assert!(tx.verify("tessera-test").is_err());
    }

    #[test]
    fn test_multi_send_must_balance() {
        let msg = Msg::Bank(BankMsg::MultiSend {
            inputs: vec![Io {
                address: Address::from_raw("a"),
                coins: DecCoins::parse("5tsr").unwrap(),
            }],
            outputs: vec![Io {
                address: Address::from_raw("b"),
                coins: DecCoins::parse("4tsr").unwrap(),
            }],
        });
        assert!(msg.validate_basic().is_err());
        assert_eq!(msg.route(), ROUTE_BANK);
        assert_eq!(msg.kind(), "multi_send");
    }
}
