//! Canonicity challenges: finding competitors and proving inclusion.

use itertools::Itertools;
use plasma_watcher_primitives::position::Position;
use plasma_watcher_tx::{recover::recover_spenders, Signature, Signed, Transaction};

use crate::{
    core::Core,
    errors::ChallengeError,
    known_tx,
    request::Request,
    tx_appendix::TxAppendix,
};

/// The evidence the contract accepts to challenge an in-flight exit as non-canonical.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompetitorEvidence {
    /// The raw encoding of the in-flight transaction.
    pub in_flight_txbytes: Vec<u8>,

    /// The in-flight input slot the competitor double-spends.
    pub in_flight_input_index: u8,

    /// The raw encoding of the competing transaction.
    pub competing_txbytes: Vec<u8>,

    /// The competitor's input slot consuming the shared position.
    pub competing_input_index: u8,

    /// The shared spender's signature over the competing transaction.
    pub competing_sig: Signature,

    /// Where the competitor is included, zero if it was only seen off-chain.
    pub competing_tx_pos: Position,

    /// The competitor's inclusion proof, empty if it was only seen off-chain.
    pub competing_proof: Vec<u8>,
}

/// The evidence the contract accepts to answer a canonicity challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicityEvidence {
    /// The raw encoding of the in-flight transaction.
    pub in_flight_txbytes: Vec<u8>,

    /// Where the in-flight transaction is included.
    pub in_flight_tx_pos: Position,

    /// The in-flight transaction's inclusion proof.
    pub in_flight_proof: Vec<u8>,
}

impl Core {
    /// Finds a competitor for the in-flight exit of `ife_txbytes` and assembles the
    /// challenge evidence.
    ///
    /// Known transactions are scanned blocks-first in ascending order, so among included
    /// competitors the oldest wins; an appendix-only competitor carries a zero position
    /// and an empty proof.
    pub fn get_competitor_for_ife(
        &self,
        request: &Request,
        ife_txbytes: &[u8],
    ) -> Result<CompetitorEvidence, ChallengeError> {
        let tx_hash = Transaction::decode(ife_txbytes)?.raw_hash();
        let Some(ife) = self.in_flight_exits().get(&tx_hash) else {
            return Err(ChallengeError::IfeNotKnownForTx { tx_hash });
        };

        let appendix = TxAppendix::from_core(self);
        let known = known_tx::collect(&appendix, &request.blocks_result);
        let slots: Vec<(u8, Position)> = ife
            .tx
            .raw
            .inputs
            .iter()
            .enumerate()
            .map(|(index, position)| (index as u8, *position))
            .collect();

        let competitor = known_tx::double_spends(&slots, tx_hash, &known)
            .into_iter()
            .next()
            .ok_or(ChallengeError::CompetitorNotFound)?;

        // The spender of the shared input signed both transactions; its signature on the
        // competitor is what the contract verifies.
        let ife_spenders =
            recover_spenders(&ife.tx).expect("in-flight signatures were validated at ingest");
        let spender = ife_spenders[competitor.slot_index as usize];
        let competitor_spenders = recover_spenders(&competitor.known_tx.signed)
            .expect("known transactions carry one valid signature per input");
        let sig_index = competitor_spenders
            .iter()
            .position(|address| *address == spender)
            .expect("a double-spending competitor must carry the shared spender's signature");

        let (competing_tx_pos, competing_proof) = match competitor.known_tx.inclusion {
            Some(position) => {
                let block = request
                    .blocks_result
                    .iter()
                    .find(|block| block.number == position.blknum)
                    .expect("inclusion position refers to a fetched block");
                let proof = block
                    .inclusion_proof(position.txindex as usize)
                    .expect("inclusion txindex lies within the block");
                (position, proof)
            }
            None => (Position::ZERO, Vec::new()),
        };

        Ok(CompetitorEvidence {
            in_flight_txbytes: ife_txbytes.to_vec(),
            in_flight_input_index: competitor.slot_index,
            competing_txbytes: competitor.known_tx.signed.raw.encode(),
            competing_input_index: competitor.known_spent_index,
            competing_sig: competitor.known_tx.signed.sigs[sig_index],
            competing_tx_pos,
            competing_proof,
        })
    }

    /// Proves the in-flight transaction of `ife_txbytes` canonical by locating it in a
    /// fetched block.
    pub fn prove_canonical_for_ife(
        &self,
        request: &Request,
        ife_txbytes: &[u8],
    ) -> Result<CanonicityEvidence, ChallengeError> {
        let tx_hash = Transaction::decode(ife_txbytes)?.raw_hash();
        if !self.in_flight_exits().contains_key(&tx_hash) {
            return Err(ChallengeError::IfeNotKnownForTx { tx_hash });
        }

        for block in request
            .blocks_result
            .iter()
            .sorted_by_key(|block| block.number)
        {
            for (txindex, tx_bytes) in block.transactions.iter().enumerate() {
                let signed = Signed::decode(tx_bytes)
                    .expect("transaction in a validated child block must decode");
                if signed.raw.raw_hash() == tx_hash {
                    let proof = block
                        .inclusion_proof(txindex)
                        .expect("txindex enumerated from the block");
                    return Ok(CanonicityEvidence {
                        in_flight_txbytes: ife_txbytes.to_vec(),
                        in_flight_tx_pos: Position::new(block.number, txindex as u32, 0),
                        in_flight_proof: proof,
                    });
                }
            }
        }

        Err(ChallengeError::CanonicalNotFound)
    }

    /// Scans the fetched spending blocks for in-flight transactions lacking an inclusion
    /// witness and records where each was seen.
    ///
    /// The witness is in-memory state only: this deliberately produces no persistence
    /// deltas, and a restarted watcher rediscovers inclusions from blocks.
    pub fn find_ifes_in_blocks(&mut self, request: &Request) {
        let blocks: Vec<_> = request
            .ife_input_spending_blocks_result
            .iter()
            .sorted_by_key(|block| block.number)
            .collect();

        for ife in self
            .in_flight_exits_mut()
            .values_mut()
            .filter(|ife| ife.tx_seen_in_blocks_at.is_none())
        {
            let encoded = ife.tx.encode();
            'blocks: for block in &blocks {
                for (txindex, tx_bytes) in block.transactions.iter().enumerate() {
                    if *tx_bytes == encoded {
                        let proof = block
                            .inclusion_proof(txindex)
                            .expect("txindex enumerated from the block");
                        ife.tx_seen_in_blocks_at =
                            Some((Position::new(block.number, txindex as u32, 0), proof));
                        break 'blocks;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fixtures;

    use super::*;

    #[test]
    fn oldest_included_competitor_wins() {
        // seed scenario: blocks 2000 and 3000 each double-spend the ife input
        let mut core = fixtures::core();
        let shared = Position::new(1000, 0, 0);
        let ife_tx = fixtures::signed_tx(vec![shared], vec![(0xaa, 10)], &[1]);
        let older = fixtures::signed_tx(vec![shared], vec![(0xbb, 10)], &[1]);
        let newer = fixtures::signed_tx(vec![shared], vec![(0xcc, 10)], &[1]);
        fixtures::add_ife(&mut core, &ife_tx);

        let block_2000 = fixtures::block(2000, &[older.clone()]);
        let mut request = Request::new(100, 5000);
        request.blocks_result = vec![fixtures::block(3000, &[newer]), block_2000.clone()];

        let evidence = core
            .get_competitor_for_ife(&request, &ife_tx.raw.encode())
            .unwrap();
        assert_eq!(evidence.competing_txbytes, older.raw.encode());
        assert_eq!(evidence.competing_tx_pos, Position::new(2000, 0, 0));
        assert_eq!(evidence.competing_proof, block_2000.inclusion_proof(0).unwrap());
        assert_eq!(evidence.in_flight_input_index, 0);
        assert_eq!(evidence.competing_input_index, 0);
        assert_eq!(evidence.competing_sig, older.sigs[0]);
    }

    #[test]
    fn appendix_competitor_carries_no_position() {
        let mut core = fixtures::core();
        let shared = Position::new(1000, 0, 0);
        let ife_tx = fixtures::signed_tx(vec![shared], vec![(0xaa, 10)], &[1]);
        let rival_tx = fixtures::signed_tx(vec![shared], vec![(0xbb, 10)], &[1]);
        fixtures::add_ife(&mut core, &ife_tx);
        fixtures::add_ife(&mut core, &rival_tx);

        let request = Request::new(100, 5000);
        let evidence = core
            .get_competitor_for_ife(&request, &ife_tx.raw.encode())
            .unwrap();
        assert_eq!(evidence.competing_tx_pos, Position::ZERO);
        assert!(evidence.competing_proof.is_empty());
    }

    #[test]
    fn no_competitor_is_an_error() {
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        fixtures::add_ife(&mut core, &ife_tx);

        assert_eq!(
            core.get_competitor_for_ife(&Request::new(100, 5000), &ife_tx.raw.encode()),
            Err(ChallengeError::CompetitorNotFound)
        );
    }

    #[test]
    fn prove_canonical_finds_the_inclusion() {
        // seed scenario: the challenged ife is actually included in block 5000
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        fixtures::add_ife(&mut core, &ife_tx);

        let filler = fixtures::signed_tx(vec![Position::new(900, 0, 0)], vec![(0xdd, 1)], &[2]);
        let block = fixtures::block(5000, &[filler, ife_tx.clone()]);
        let mut request = Request::new(100, 6000);
        request.blocks_result = vec![block.clone()];

        let evidence = core
            .prove_canonical_for_ife(&request, &ife_tx.raw.encode())
            .unwrap();
        assert_eq!(evidence.in_flight_tx_pos, Position::new(5000, 1, 0));
        assert_eq!(evidence.in_flight_proof, block.inclusion_proof(1).unwrap());
    }

    #[test]
    fn prove_canonical_without_inclusion_fails() {
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        fixtures::add_ife(&mut core, &ife_tx);

        assert_eq!(
            core.prove_canonical_for_ife(&Request::new(100, 6000), &ife_tx.raw.encode()),
            Err(ChallengeError::CanonicalNotFound)
        );
    }

    #[test]
    fn find_ifes_in_blocks_records_the_witness_in_memory_only() {
        let mut core = fixtures::core();
        let ife_tx = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &ife_tx);

        let block = fixtures::block(3000, &[ife_tx.clone()]);
        let mut request = Request::new(100, 5000);
        request.ife_input_spending_blocks_result = vec![block.clone()];

        core.find_ifes_in_blocks(&request);
        let (seen_at, proof) = core.in_flight_exits()[&tx_hash]
            .tx_seen_in_blocks_at
            .clone()
            .unwrap();
        assert_eq!(seen_at, Position::new(3000, 0, 0));
        assert_eq!(proof, block.inclusion_proof(0).unwrap());

        // the witness does not survive the persisted form
        let blob = core.in_flight_exits()[&tx_hash].to_blob();
        let restored = crate::in_flight_info::InFlightExitInfo::from_blob(&blob).unwrap();
        assert_eq!(restored.tx_seen_in_blocks_at, None);
    }
}
