//! Double-spend proofs for piggybacked in-flight exit slots.
//!
//! A piggybacked input is invalid if any other known transaction spends the same input
//! position; a piggybacked output is invalid if, once the exiting transaction is known to
//! be included, any other known transaction spends the output's position. The same proof
//! list backs both the validity analysis and the per-slot challenge getters.

use ethereum_types::H256;
use plasma_watcher_primitives::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    position::Position,
};
use plasma_watcher_tx::{Signature, Transaction};

use crate::{
    core::Core,
    errors::ChallengeError,
    known_tx::{self, double_spends, DoubleSpend, KnownTx},
    request::Request,
    tx_appendix::TxAppendix,
};

/// The proven double-spends of one in-flight exit's piggybacked slots.
#[derive(Debug)]
pub(crate) struct InvalidPiggybackProof<'a> {
    /// The raw hash of the in-flight transaction.
    pub tx_hash: H256,

    /// The raw encoding of the in-flight transaction.
    pub txbytes: Vec<u8>,

    /// The first double-spend proof per invalid input slot.
    pub inputs: Vec<(u8, DoubleSpend<'a>)>,

    /// The first double-spend proof per invalid output slot.
    pub outputs: Vec<(u8, DoubleSpend<'a>)>,
}

/// Collects the double-spend proofs for every active in-flight exit.
pub(crate) fn invalid_piggybacks<'a>(
    core: &Core,
    known: &'a [KnownTx],
) -> Vec<InvalidPiggybackProof<'a>> {
    let mut proofs = Vec::new();

    for (tx_hash, ife) in core.in_flight_exits().iter().filter(|(_, ife)| ife.is_active) {
        let mut inputs = Vec::new();
        for slot in ife.piggybacked_input_indices() {
            let Some(position) = ife.tx.raw.inputs.get(slot as usize).copied() else {
                continue;
            };
            if let Some(found) = double_spends(&[(slot, position)], *tx_hash, known)
                .into_iter()
                .next()
            {
                inputs.push((slot, found));
            }
        }

        let mut outputs = Vec::new();
        if let Some((seen_at, _)) = &ife.tx_seen_in_blocks_at {
            for slot in ife.piggybacked_output_indices() {
                let position = Position::new(seen_at.blknum, seen_at.txindex, slot);
                if let Some(found) = double_spends(&[(slot, position)], *tx_hash, known)
                    .into_iter()
                    .next()
                {
                    outputs.push((slot, found));
                }
            }
        }

        if !inputs.is_empty() || !outputs.is_empty() {
            proofs.push(InvalidPiggybackProof {
                tx_hash: *tx_hash,
                txbytes: ife.tx.raw.encode(),
                inputs,
                outputs,
            });
        }
    }

    proofs
}

/// The evidence the contract accepts to challenge a piggybacked input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputChallengeData {
    /// The raw encoding of the in-flight transaction.
    pub in_flight_txbytes: Vec<u8>,

    /// The challenged input slot.
    pub in_flight_input_index: u8,

    /// The raw encoding of the transaction double-spending the input.
    pub spending_txbytes: Vec<u8>,

    /// The input slot of the spending transaction that consumes the position.
    pub spending_input_index: u8,

    /// The spender's signature over the spending transaction.
    pub spending_sig: Signature,
}

/// The evidence the contract accepts to challenge a piggybacked output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputChallengeData {
    /// The raw encoding of the in-flight transaction.
    pub in_flight_txbytes: Vec<u8>,

    /// Where the in-flight transaction is included.
    pub in_flight_output_pos: Position,

    /// The inclusion proof of the in-flight transaction.
    pub in_flight_proof: Vec<u8>,

    /// The raw encoding of the transaction double-spending the output.
    pub spending_txbytes: Vec<u8>,

    /// The input slot of the spending transaction that consumes the position.
    pub spending_input_index: u8,

    /// The spender's signature over the spending transaction.
    pub spending_sig: Signature,
}

impl Core {
    /// Assembles the challenge for an invalidly piggybacked input.
    pub fn get_input_challenge_data(
        &self,
        request: &Request,
        ife_txbytes: &[u8],
        input_index: u8,
    ) -> Result<InputChallengeData, ChallengeError> {
        if (input_index as usize) >= MAX_INPUTS {
            return Err(ChallengeError::PiggybackedIndexOutOfRange { index: input_index });
        }
        let tx_hash = Transaction::decode(ife_txbytes)?.raw_hash();
        if !self.in_flight_exits().contains_key(&tx_hash) {
            return Err(ChallengeError::IfeNotKnownForTx { tx_hash });
        }

        let appendix = TxAppendix::from_core(self);
        let known = known_tx::collect(&appendix, &request.blocks_result);
        let proofs = invalid_piggybacks(self, &known);

        let found = proofs
            .iter()
            .filter(|proof| proof.tx_hash == tx_hash)
            .flat_map(|proof| proof.inputs.iter())
            .find(|(slot, _)| *slot == input_index)
            .map(|(_, double_spend)| double_spend)
            .ok_or(ChallengeError::NoDoubleSpendOnParticularPiggyback)?;

        Ok(InputChallengeData {
            in_flight_txbytes: ife_txbytes.to_vec(),
            in_flight_input_index: input_index,
            spending_txbytes: found.known_tx.signed.raw.encode(),
            spending_input_index: found.known_spent_index,
            spending_sig: spending_sig(found),
        })
    }

    /// Assembles the challenge for an invalidly piggybacked output.
    pub fn get_output_challenge_data(
        &self,
        request: &Request,
        ife_txbytes: &[u8],
        output_index: u8,
    ) -> Result<OutputChallengeData, ChallengeError> {
        if (output_index as usize) >= MAX_OUTPUTS {
            return Err(ChallengeError::PiggybackedIndexOutOfRange {
                index: output_index,
            });
        }
        let tx_hash = Transaction::decode(ife_txbytes)?.raw_hash();
        let Some(ife) = self.in_flight_exits().get(&tx_hash) else {
            return Err(ChallengeError::IfeNotKnownForTx { tx_hash });
        };

        let appendix = TxAppendix::from_core(self);
        let known = known_tx::collect(&appendix, &request.blocks_result);
        let proofs = invalid_piggybacks(self, &known);

        let found = proofs
            .iter()
            .filter(|proof| proof.tx_hash == tx_hash)
            .flat_map(|proof| proof.outputs.iter())
            .find(|(slot, _)| *slot == output_index)
            .map(|(_, double_spend)| double_spend)
            .ok_or(ChallengeError::NoDoubleSpendOnParticularPiggyback)?;

        let (in_flight_output_pos, in_flight_proof) = ife
            .tx_seen_in_blocks_at
            .clone()
            .expect("an output double-spend is only provable for an included transaction");

        Ok(OutputChallengeData {
            in_flight_txbytes: ife_txbytes.to_vec(),
            in_flight_output_pos,
            in_flight_proof,
            spending_txbytes: found.known_tx.signed.raw.encode(),
            spending_input_index: found.known_spent_index,
            spending_sig: spending_sig(found),
        })
    }
}

// The spending transaction carries one signature per input; its absence for a proven
// spend slot is a bug, not a recoverable condition.
fn spending_sig(found: &DoubleSpend<'_>) -> Signature {
    found
        .known_tx
        .signed
        .sigs
        .get(found.known_spent_index as usize)
        .copied()
        .expect("known transaction must carry a signature for each input")
}

#[cfg(test)]
mod tests {
    use crate::testing::fixtures;

    use super::*;

    #[test]
    fn input_challenge_points_at_the_double_spender() {
        let mut core = fixtures::core();
        let shared = Position::new(1000, 0, 0);
        let ife_tx = fixtures::signed_tx(vec![shared], vec![(0xaa, 10)], &[1]);
        let rival = fixtures::signed_tx(vec![Position::new(900, 0, 0), shared], vec![(0xbb, 10)], &[1, 1]);
        let tx_hash = fixtures::add_ife(&mut core, &ife_tx);
        core.new_piggybacks(&[crate::rootchain::PiggybackEvent {
            tx_hash,
            output_index: 0,
        }])
        .unwrap();

        let mut request = Request::new(100, 4000);
        request.blocks_result = vec![fixtures::block(2000, &[rival.clone()])];

        let challenge = core
            .get_input_challenge_data(&request, &ife_tx.raw.encode(), 0)
            .unwrap();
        assert_eq!(challenge.spending_txbytes, rival.raw.encode());
        assert_eq!(challenge.spending_input_index, 1);
        assert_eq!(challenge.spending_sig, rival.sigs[1]);
    }

    #[test]
    fn output_challenge_requires_inclusion_and_a_spend() {
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &ife_tx);
        core.new_piggybacks(&[crate::rootchain::PiggybackEvent {
            tx_hash,
            output_index: 4,
        }])
        .unwrap();

        // the in-flight tx is included at (3000, 0) and its output 0 is spent by a rival
        let inclusion_block = fixtures::block(3000, &[ife_tx.clone()]);
        let rival = fixtures::signed_tx(vec![Position::new(3000, 0, 0)], vec![(0xbb, 10)], &[1]);

        let mut request = Request::new(100, 5000);
        request.ife_input_spending_blocks_result = vec![inclusion_block.clone()];
        core.find_ifes_in_blocks(&request);

        request.blocks_result = vec![fixtures::block(4000, &[rival.clone()])];

        let challenge = core
            .get_output_challenge_data(&request, &ife_tx.raw.encode(), 0)
            .unwrap();
        assert_eq!(challenge.in_flight_output_pos, Position::new(3000, 0, 0));
        assert_eq!(
            challenge.in_flight_proof,
            inclusion_block.inclusion_proof(0).unwrap()
        );
        assert_eq!(challenge.spending_txbytes, rival.raw.encode());
    }

    #[test]
    fn index_out_of_range_is_rejected() {
        let core = fixtures::core();
        let request = Request::new(100, 4000);
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);

        assert_eq!(
            core.get_input_challenge_data(&request, &ife_tx.raw.encode(), 4),
            Err(ChallengeError::PiggybackedIndexOutOfRange { index: 4 })
        );
        assert_eq!(
            core.get_output_challenge_data(&request, &ife_tx.raw.encode(), 7),
            Err(ChallengeError::PiggybackedIndexOutOfRange { index: 7 })
        );
    }

    #[test]
    fn no_double_spend_is_reported_as_such() {
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &ife_tx);
        core.new_piggybacks(&[crate::rootchain::PiggybackEvent {
            tx_hash,
            output_index: 0,
        }])
        .unwrap();

        let request = Request::new(100, 4000);
        assert_eq!(
            core.get_input_challenge_data(&request, &ife_tx.raw.encode(), 0),
            Err(ChallengeError::NoDoubleSpendOnParticularPiggyback)
        );
    }
}
