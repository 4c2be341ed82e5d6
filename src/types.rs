use std::collections::HashMap;

use solana_pubkey::Pubkey;

use crate::codec::parse_pubkey;
use crate::error::Error;

/// A compiled instruction as returned by the ledger's JSON transaction encoding.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    /// Index of the invoked program in the transaction's account keys.
    pub program_id_index: usize,
    /// Indices into the transaction's account keys.
    pub accounts: Vec<usize>,
    /// Instruction data (base58).
    pub data: String,
}

impl RawInstruction {
    pub fn new(program_id_index: usize, accounts: Vec<usize>, data: &[u8]) -> Self {
        Self {
            program_id_index,
            accounts,
            data: bs58::encode(data).into_string(),
        }
    }
}

/// Cross-program invocations recorded under one top-level instruction.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawInnerInstructions {
    /// Position of the top-level instruction that issued these.
    pub index: usize,
    pub instructions: Vec<RawInstruction>,
}

/// One confirmed transaction, as read from the ledger history.
#[derive(serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// Transaction signature (base58).
    pub signature: String,
    /// Slot in which the transaction landed.
    pub slot: u64,
    /// Resolved account keys (base58), static keys followed by loaded addresses.
    pub account_keys: Vec<String>,
    pub instructions: Vec<RawInstruction>,
    #[serde(default)]
    pub inner_instructions: Vec<RawInnerInstructions>,
}

/// An instruction with program, accounts and data resolved against its transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

impl ResolvedInstruction {
    pub fn account(&self, position: usize, role: &str) -> Result<&Pubkey, Error> {
        self.accounts.get(position).ok_or_else(|| {
            Error::format(format!(
                "account #{position} ({role}) missing from instruction with {} accounts",
                self.accounts.len()
            ))
        })
    }
}

impl RawTransaction {
    /// Parses the account key table once so instructions can be resolved by index.
    pub fn key_table(&self) -> Result<Vec<Pubkey>, Error> {
        self.account_keys.iter().map(|k| parse_pubkey(k)).collect()
    }

    /// Nested instructions grouped by the top-level instruction index.
    pub fn inner_by_index(&self) -> HashMap<usize, &[RawInstruction]> {
        self.inner_instructions
            .iter()
            .map(|inner| (inner.index, inner.instructions.as_slice()))
            .collect()
    }
}

pub fn resolve_instruction(
    ix: &RawInstruction,
    keys: &[Pubkey],
) -> Result<ResolvedInstruction, Error> {
    let key_at = |index: usize| {
        keys.get(index).copied().ok_or_else(|| {
            Error::format(format!(
                "account index {index} out of bounds for {} keys",
                keys.len()
            ))
        })
    };
    Ok(ResolvedInstruction {
        program_id: key_at(ix.program_id_index)?,
        accounts: ix
            .accounts
            .iter()
            .map(|i| key_at(*i))
            .collect::<Result<_, _>>()?,
        data: bs58::decode(&ix.data)
            .into_vec()
            .map_err(|e| Error::format(format!("instruction data is not base58: {e}")))?,
    })
}
