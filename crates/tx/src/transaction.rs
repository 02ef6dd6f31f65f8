//! The raw transaction and its canonical encoding.

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use plasma_watcher_primitives::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    position::Position,
};
use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::errors::TxError;

/// One output of a child-chain transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// The address entitled to spend or exit this output. [`Address::zero`] means no owner.
    pub owner: Address,

    /// The token contract, with [`Address::zero`] denoting ether.
    pub currency: Address,

    /// The amount of `currency` held by this output.
    pub amount: U256,
}

impl TxOutput {
    /// Creates an output.
    pub fn new(owner: Address, currency: Address, amount: U256) -> Self {
        TxOutput {
            owner,
            currency,
            amount,
        }
    }

    /// Returns `true` if this is an all-zero padding slot.
    pub fn is_empty(&self) -> bool {
        self.owner.is_zero() && self.currency.is_zero() && self.amount.is_zero()
    }
}

/// A raw (unsigned) child-chain transaction.
///
/// Inputs and outputs hold only the populated slots; the canonical encoding pads both to
/// the contract arity with zero slots on the right. [`Transaction::decode`] rejects byte
/// strings whose populated slots do not form a prefix, which makes `encode` and `decode`
/// mutually inverse on all accepted values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The UTXOs consumed, at most [`MAX_INPUTS`].
    pub inputs: Vec<Position>,

    /// The UTXOs produced, at most [`MAX_OUTPUTS`].
    pub outputs: Vec<TxOutput>,

    /// Free-form 32 bytes committed alongside the transfer.
    pub metadata: H256,
}

impl Transaction {
    /// Creates a raw transaction, rejecting over-arity slot lists.
    pub fn new(
        inputs: Vec<Position>,
        outputs: Vec<TxOutput>,
        metadata: H256,
    ) -> Result<Self, TxError> {
        if inputs.len() > MAX_INPUTS || outputs.len() > MAX_OUTPUTS {
            return Err(TxError::TooManySlots);
        }
        if inputs.iter().any(Position::is_zero) || outputs.iter().any(TxOutput::is_empty) {
            return Err(TxError::NonCanonicalPadding);
        }

        Ok(Transaction {
            inputs,
            outputs,
            metadata,
        })
    }

    /// The canonical RLP encoding the root contract hashes.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(3);
        encode_slots(&mut stream, self);
        stream.out().to_vec()
    }

    /// Inverse of [`Transaction::encode`]. Rejects malformed and non-canonical input.
    pub fn decode(bytes: &[u8]) -> Result<Self, TxError> {
        let rlp = Rlp::new(bytes);
        check_consumed(&rlp, bytes)?;
        if rlp.item_count()? != 3 {
            return Err(rlp::DecoderError::RlpIncorrectListLen.into());
        }

        let tx = decode_slots(&rlp.at(0)?, &rlp.at(1)?, &rlp.at(2)?)?;
        Ok(tx)
    }

    /// keccak256 of the canonical encoding; the key under which in-flight exits are
    /// tracked.
    pub fn raw_hash(&self) -> H256 {
        keccak(self.encode())
    }
}

// The slot encoding is shared between raw and signed transactions.
pub(crate) fn encode_slots(stream: &mut RlpStream, tx: &Transaction) {
    stream.begin_list(MAX_INPUTS);
    for index in 0..MAX_INPUTS {
        let input = tx.inputs.get(index).copied().unwrap_or(Position::ZERO);
        stream.begin_list(3);
        stream.append(&input.blknum);
        stream.append(&input.txindex);
        stream.append(&input.oindex);
    }

    stream.begin_list(MAX_OUTPUTS);
    for index in 0..MAX_OUTPUTS {
        let output = tx.outputs.get(index).copied().unwrap_or_default();
        stream.begin_list(3);
        stream.append(&output.owner);
        stream.append(&output.currency);
        stream.append(&output.amount);
    }

    stream.append(&tx.metadata);
}

pub(crate) fn decode_slots(
    inputs: &Rlp<'_>,
    outputs: &Rlp<'_>,
    metadata: &Rlp<'_>,
) -> Result<Transaction, TxError> {
    if inputs.item_count()? != MAX_INPUTS || outputs.item_count()? != MAX_OUTPUTS {
        return Err(rlp::DecoderError::RlpIncorrectListLen.into());
    }

    let mut decoded_inputs = Vec::new();
    let mut padding_seen = false;
    for index in 0..MAX_INPUTS {
        let slot = inputs.at(index)?;
        if slot.item_count()? != 3 {
            return Err(rlp::DecoderError::RlpIncorrectListLen.into());
        }
        let position = Position::new(
            slot.at(0)?.as_val()?,
            slot.at(1)?.as_val()?,
            slot.at(2)?.as_val()?,
        );
        match (position.is_zero(), padding_seen) {
            (true, _) => padding_seen = true,
            (false, true) => return Err(TxError::NonCanonicalPadding),
            (false, false) => decoded_inputs.push(position),
        }
    }

    let mut decoded_outputs = Vec::new();
    let mut padding_seen = false;
    for index in 0..MAX_OUTPUTS {
        let slot = outputs.at(index)?;
        if slot.item_count()? != 3 {
            return Err(rlp::DecoderError::RlpIncorrectListLen.into());
        }
        let output = TxOutput::new(slot.at(0)?.as_val()?, slot.at(1)?.as_val()?, slot.at(2)?.as_val()?);
        match (output.is_empty(), padding_seen) {
            (true, _) => padding_seen = true,
            (false, true) => return Err(TxError::NonCanonicalPadding),
            (false, false) => decoded_outputs.push(output),
        }
    }

    Ok(Transaction {
        inputs: decoded_inputs,
        outputs: decoded_outputs,
        metadata: metadata.as_val()?,
    })
}

// Rlp::new accepts trailing garbage after the outer list; reject it explicitly.
pub(crate) fn check_consumed(rlp: &Rlp<'_>, bytes: &[u8]) -> Result<(), TxError> {
    let payload = rlp.payload_info()?;
    if payload.header_len + payload.value_len != bytes.len() {
        return Err(rlp::DecoderError::RlpIsTooBig.into());
    }
    Ok(())
}
