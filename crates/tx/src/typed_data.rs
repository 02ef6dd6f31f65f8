//! The EIP-712 style typed-data hash of a transaction.
//!
//! This is the sole message fed to signature recovery. The domain separator and the
//! typehashes mirror the root contract's typed-data layout byte for byte; the struct hash
//! pads inputs and outputs to the contract arity with zero slots, exactly as the contract
//! does when it verifies a challenge signature.

use std::sync::LazyLock;

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use plasma_watcher_primitives::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    position::Position,
};

use crate::transaction::{Transaction, TxOutput};

const DOMAIN_NAME: &str = "Plasma Watcher";
const DOMAIN_VERSION: &str = "1";
const DOMAIN_SALT: [u8; 32] = [
    0xfa, 0xd5, 0xc7, 0xf6, 0x26, 0xd8, 0x0f, 0x92, 0x56, 0xef, 0x01, 0x92, 0x9f, 0x3b, 0xeb,
    0x96, 0xe0, 0x58, 0xb8, 0xb4, 0xb0, 0xe3, 0xfe, 0x52, 0xd8, 0x4f, 0x05, 0x4c, 0x0e, 0x2a,
    0x7a, 0x83,
];

static DOMAIN_TYPEHASH: LazyLock<H256> =
    LazyLock::new(|| keccak("EIP712Domain(string name,string version,bytes32 salt)"));

static TX_TYPEHASH: LazyLock<H256> = LazyLock::new(|| {
    keccak(
        "Transaction(\
         Input input0,Input input1,Input input2,Input input3,\
         Output output0,Output output1,Output output2,Output output3,\
         bytes32 metadata)\
         Input(uint256 blknum,uint256 txindex,uint256 oindex)\
         Output(address owner,address currency,uint256 amount)",
    )
});

static INPUT_TYPEHASH: LazyLock<H256> =
    LazyLock::new(|| keccak("Input(uint256 blknum,uint256 txindex,uint256 oindex)"));

static OUTPUT_TYPEHASH: LazyLock<H256> =
    LazyLock::new(|| keccak("Output(address owner,address currency,uint256 amount)"));

static DOMAIN_SEPARATOR: LazyLock<H256> = LazyLock::new(|| {
    let mut buf = Vec::with_capacity(4 * 32);
    buf.extend_from_slice(DOMAIN_TYPEHASH.as_bytes());
    buf.extend_from_slice(keccak(DOMAIN_NAME).as_bytes());
    buf.extend_from_slice(keccak(DOMAIN_VERSION).as_bytes());
    buf.extend_from_slice(&DOMAIN_SALT);
    keccak(buf)
});

/// The typed-data hash signed by every spender of the transaction's inputs.
pub fn typed_data_hash(tx: &Transaction) -> H256 {
    let mut buf = Vec::with_capacity(2 + 2 * 32);
    buf.extend_from_slice(&[0x19, 0x01]);
    buf.extend_from_slice(DOMAIN_SEPARATOR.as_bytes());
    buf.extend_from_slice(hash_struct(tx).as_bytes());
    keccak(buf)
}

fn hash_struct(tx: &Transaction) -> H256 {
    let mut buf = Vec::with_capacity(10 * 32);
    buf.extend_from_slice(TX_TYPEHASH.as_bytes());
    for index in 0..MAX_INPUTS {
        let input = tx.inputs.get(index).copied().unwrap_or(Position::ZERO);
        buf.extend_from_slice(hash_input(input).as_bytes());
    }
    for index in 0..MAX_OUTPUTS {
        let output = tx.outputs.get(index).copied().unwrap_or_default();
        buf.extend_from_slice(hash_output(output).as_bytes());
    }
    buf.extend_from_slice(tx.metadata.as_bytes());
    keccak(buf)
}

fn hash_input(input: Position) -> H256 {
    let mut buf = Vec::with_capacity(4 * 32);
    buf.extend_from_slice(INPUT_TYPEHASH.as_bytes());
    buf.extend_from_slice(&word(input.blknum.into()));
    buf.extend_from_slice(&word(input.txindex.into()));
    buf.extend_from_slice(&word(input.oindex.into()));
    keccak(buf)
}

fn hash_output(output: TxOutput) -> H256 {
    let mut buf = Vec::with_capacity(4 * 32);
    buf.extend_from_slice(OUTPUT_TYPEHASH.as_bytes());
    buf.extend_from_slice(&address_word(output.owner));
    buf.extend_from_slice(&address_word(output.currency));
    buf.extend_from_slice(&word(output.amount));
    keccak(buf)
}

fn word(value: U256) -> [u8; 32] {
    value.to_big_endian()
}

fn address_word(address: Address) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(address.as_bytes());
    buf
}
