//! Deterministic fixtures: keys, signed transactions, blocks and pre-populated cores.

use ethereum_types::{Address, H256, U256};
use plasma_watcher_params::WatcherParams;
use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::{
    recover::test_signing, transaction::TxOutput, Signature, Signed, Transaction,
};
use secp256k1::SecretKey;

use crate::{
    collaborators::Block,
    core::Core,
    in_flight_info::InFlightExitInfo,
    rootchain::{
        ContractId, ExitStarted, IfeChallenged, InFlightExitStarted, InFlightExitStatus,
        StandardExitStatus,
    },
};

/// A deterministic secret key derived from a single seed byte.
pub fn key(seed: u8) -> SecretKey {
    SecretKey::from_slice(&[seed; 32]).expect("non-zero seed bytes form a valid key")
}

/// The address controlled by [`key`].
pub fn addr_of_key(seed: u8) -> Address {
    test_signing::address_of(&key(seed))
}

/// The parameters every fixture core runs with.
pub fn params() -> WatcherParams {
    WatcherParams {
        sla_margin: 10,
        ..WatcherParams::default()
    }
}

/// An empty core with [`params`].
pub fn core() -> Core {
    Core::new(&params())
}

/// A signed transaction: `outputs` are `(owner seed byte, amount)` pairs paying out in
/// ether, `key_seeds` name the signer of each input.
pub fn signed_tx(inputs: Vec<Position>, outputs: Vec<(u8, u64)>, key_seeds: &[u8]) -> Signed {
    let outputs = outputs
        .into_iter()
        .map(|(owner, amount)| {
            TxOutput::new(Address::repeat_byte(owner), Address::zero(), U256::from(amount))
        })
        .collect();
    let raw = Transaction::new(inputs, outputs, H256::zero()).expect("fixture arity is valid");
    let keys: Vec<SecretKey> = key_seeds.iter().map(|seed| key(*seed)).collect();
    test_signing::sign(raw, &keys)
}

/// A child block over the given transactions, with the committed root computed.
pub fn block(number: u64, txs: &[Signed]) -> Block {
    Block::new(number, txs.iter().map(Signed::encode).collect())
        .expect("fixture blocks fit the tree")
}

/// A contract identifier from a single byte.
pub fn contract_id(byte: u8) -> ContractId {
    ContractId([byte; 24])
}

/// The contract identifier fixtures assign to an in-flight exit: the leading bytes of
/// its raw transaction hash, which keeps identifiers unique per transaction.
pub fn contract_id_for(signed: &Signed) -> ContractId {
    let hash = signed.raw.raw_hash();
    let mut id = [0u8; 24];
    id.copy_from_slice(&hash.as_bytes()[..24]);
    ContractId(id)
}

/// A started-exit log and contract status for an exit of `(owner, amount)` at
/// `utxo_pos`. The created transaction pads earlier output slots with dust.
pub fn exit_started(
    utxo_pos: Position,
    owner: u8,
    amount: u64,
    eth_height: u64,
) -> (ExitStarted, StandardExitStatus) {
    let mut outputs: Vec<(u8, u64)> = (0..utxo_pos.oindex).map(|_| (0x01, 1)).collect();
    outputs.push((owner, amount));
    let tx = signed_tx(vec![], outputs, &[]);

    let event = ExitStarted {
        eth_height,
        utxo_pos: utxo_pos.encode(),
        output_tx: tx.raw.encode(),
    };
    let status = StandardExitStatus {
        exit_target: Address::repeat_byte(owner),
        amount: U256::from(amount),
    };
    (event, status)
}

/// A started in-flight exit log and contract status for `signed`.
pub fn ife_started(signed: &Signed) -> (InFlightExitStarted, InFlightExitStatus) {
    let event = InFlightExitStarted {
        eth_height: 1,
        tx_bytes: signed.raw.encode(),
        sigs: signed.sigs.clone(),
    };
    let status = InFlightExitStatus {
        timestamp: 1,
        contract_id: contract_id_for(signed),
    };
    (event, status)
}

/// A standalone in-flight exit record for `signed`, active and presumed canonical.
pub fn ife(signed: &Signed) -> InFlightExitInfo {
    let (event, status) = ife_started(signed);
    InFlightExitInfo::from_event(&event, &status).expect("fixture transactions are valid")
}

/// Ingests `signed` as an in-flight exit into `core`, returning its raw hash key.
pub fn add_ife(core: &mut Core, signed: &Signed) -> H256 {
    let (event, status) = ife_started(signed);
    core.new_in_flight_exits(&[event], &[status])
        .expect("fixture ife ingests cleanly");
    signed.raw.raw_hash()
}

/// Ingests a standard exit of `(owner, amount)` at `utxo_pos` into `core`.
pub fn add_exit(core: &mut Core, utxo_pos: Position, owner: u8, amount: u64, eth_height: u64) {
    let (event, status) = exit_started(utxo_pos, owner, amount, eth_height);
    core.new_exits(&[event], &[status])
        .expect("fixture exit ingests cleanly");
}

/// A canonicity-challenge log presenting `competitor` against the exit of `tx_hash`.
pub fn ife_challenge(tx_hash: H256, competitor: &Signed, input_index: u8) -> IfeChallenged {
    IfeChallenged {
        tx_hash,
        competitor_position: 0,
        competing_tx: competitor.raw.encode(),
        competing_input_index: input_index,
        competing_sig: competitor.sigs[input_index as usize],
    }
}

/// An arbitrary well-formed signature payload, for events that never reach recovery.
pub fn dummy_sig() -> Signature {
    Signature([0x01; 65])
}
