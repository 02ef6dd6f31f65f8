//! The validity analysis: one pure pass classifying the chain and emitting events.

use std::collections::BTreeSet;

use ethereum_types::H256;
use plasma_watcher_primitives::{constants::MAX_INPUTS, position::Position};
use plasma_watcher_tx::recover::recover_spenders;
use tracing::warn;

use crate::{
    core::Core,
    events::{ChainStatus, Event, PiggybackSlot},
    exit_info::ExitInfo,
    known_tx::{self, KnownTx},
    piggyback,
    request::Request,
    tx_appendix::TxAppendix,
};

impl Core {
    /// Classifies the chain and emits every actionable observation, given a request
    /// whose existence answers and fetched blocks are populated.
    ///
    /// This is a pure function of `(self, request)`: it never mutates state and never
    /// performs I/O, so the driver may run it on a snapshot.
    pub fn check_validity(&self, request: &Request) -> (ChainStatus, Vec<Event>) {
        let utxo_exists = request.utxo_exists_map();
        let missing: BTreeSet<Position> = utxo_exists
            .iter()
            .filter(|(_, exists)| !**exists)
            .map(|(position, _)| *position)
            .collect();

        let appendix = TxAppendix::from_core(self);
        let known = known_tx::collect(&appendix, &request.blocks_result);

        // Positions any in-flight transaction claims as an input: a standard exit from
        // one of these double-spends against the in-flight exit.
        let appendix_inputs: BTreeSet<Position> = appendix
            .iter()
            .flat_map(|(_, signed)| signed.raw.inputs.iter().copied())
            .collect();

        let invalid_exits: Vec<(Position, &ExitInfo)> = self
            .exits()
            .iter()
            .filter(|(position, exit)| {
                exit.is_active
                    && (missing.contains(position) || appendix_inputs.contains(position))
            })
            .map(|(position, exit)| (*position, exit))
            .collect();

        let late_exits: Vec<&(Position, &ExitInfo)> = invalid_exits
            .iter()
            .filter(|(_, exit)| exit.eth_height + self.sla_margin() <= request.eth_height_now)
            .collect();

        let mut events = Vec::new();
        for (position, exit) in &late_exits {
            warn!(%position, "invalid exit unchallenged past the sla margin");
            events.push(Event::UnchallengedExit(exit.notification(*position)));
        }
        let chain_status = if late_exits.is_empty() {
            ChainStatus::Ok
        } else {
            ChainStatus::UnchallengedExit
        };

        for (position, exit) in &invalid_exits {
            events.push(Event::InvalidExit(exit.notification(*position)));
        }

        events.extend(self.non_canonical_ife_events(&known));
        events.extend(self.invalid_ife_challenge_events(&known));

        for proof in piggyback::invalid_piggybacks(self, &known) {
            events.push(Event::InvalidPiggyback {
                txbytes: proof.txbytes,
                inputs: proof.inputs.iter().map(|(slot, _)| *slot).collect(),
                outputs: proof.outputs.iter().map(|(slot, _)| *slot).collect(),
            });
        }

        events.extend(self.piggyback_available_events(&known));

        (chain_status, events)
    }

    // Presumed-canonical exits whose inputs some other known transaction also spends.
    fn non_canonical_ife_events(&self, known: &[KnownTx]) -> Vec<Event> {
        self.in_flight_exits()
            .iter()
            .filter(|(_, ife)| ife.is_active && ife.is_canonical)
            .filter(|(tx_hash, ife)| {
                let slots: Vec<(u8, Position)> = ife
                    .tx
                    .raw
                    .inputs
                    .iter()
                    .enumerate()
                    .map(|(index, position)| (index as u8, *position))
                    .collect();
                !known_tx::double_spends(&slots, **tx_hash, known).is_empty()
            })
            .map(|(_, ife)| Event::NonCanonicalIfe {
                txbytes: ife.tx.raw.encode(),
            })
            .collect()
    }

    // Exits challenged as non-canonical whose transaction is in fact included.
    fn invalid_ife_challenge_events(&self, known: &[KnownTx]) -> Vec<Event> {
        let included = included_hashes(known);
        self.in_flight_exits()
            .iter()
            .filter(|(tx_hash, ife)| {
                ife.is_active && !ife.is_canonical && included.contains(tx_hash)
            })
            .map(|(_, ife)| Event::InvalidIfeChallenge {
                txbytes: ife.tx.raw.encode(),
            })
            .collect()
    }

    // Active exits not seen in any fetched block, with the slots still open for
    // piggybacking and the addresses entitled to claim them.
    fn piggyback_available_events(&self, known: &[KnownTx]) -> Vec<Event> {
        let included = included_hashes(known);
        let mut events = Vec::new();

        for (tx_hash, ife) in self.in_flight_exits().iter() {
            if !ife.is_active || included.contains(tx_hash) {
                continue;
            }

            let spenders = recover_spenders(&ife.tx)
                .expect("in-flight signatures were validated at ingest");
            let available_inputs: Vec<PiggybackSlot> = spenders
                .iter()
                .enumerate()
                .filter(|(index, address)| {
                    !ife.is_piggybacked(*index as u8) && !address.is_zero()
                })
                .map(|(index, address)| PiggybackSlot {
                    index: index as u8,
                    address: *address,
                })
                .collect();

            let available_outputs: Vec<PiggybackSlot> = ife
                .tx
                .raw
                .outputs
                .iter()
                .enumerate()
                .filter(|(index, output)| {
                    !ife.is_piggybacked(MAX_INPUTS as u8 + *index as u8)
                        && !output.owner.is_zero()
                })
                .map(|(index, output)| PiggybackSlot {
                    index: index as u8,
                    address: output.owner,
                })
                .collect();

            if !available_inputs.is_empty() || !available_outputs.is_empty() {
                events.push(Event::PiggybackAvailable {
                    txbytes: ife.tx.raw.encode(),
                    available_inputs,
                    available_outputs,
                });
            }
        }

        events
    }
}

fn included_hashes(known: &[KnownTx]) -> BTreeSet<H256> {
    known
        .iter()
        .filter(|known_tx| known_tx.inclusion.is_some())
        .map(KnownTx::raw_hash)
        .collect()
}
