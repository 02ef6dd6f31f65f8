//! The state container and its ingest operations.
//!
//! All of the watcher's exit state lives here, exclusively owned by the driver. Every
//! ingest operation mutates the core and returns the persistence deltas the driver must
//! apply atomically with its acceptance of the call; every query planner only fills a
//! [`Request`].

use std::collections::{BTreeMap, BTreeSet};

use ethereum_types::H256;
use itertools::Itertools;
use plasma_watcher_db::{DbUpdate, PersistedState};
use plasma_watcher_params::WatcherParams;
use plasma_watcher_primitives::{
    constants::{MAX_INPUTS, MAX_OUTPUTS},
    position::Position,
};
use tracing::{debug, info, warn};

use crate::{
    competitor_info::CompetitorInfo,
    errors::CoreError,
    events::Event,
    exit_info::ExitInfo,
    in_flight_info::InFlightExitInfo,
    request::Request,
    rootchain::{
        ContractId, ExitChallenged, ExitStarted, IfeChallengeResponded, IfeChallenged,
        IfeExitSlots, IfeFinalized, InFlightExitStarted, InFlightExitStatus, PiggybackEvent,
        StandardExitStatus,
    },
};

/// The exit processor state: every in-progress exit the watcher knows about.
#[derive(Clone, Debug)]
pub struct Core {
    sla_margin: u64,
    exits: BTreeMap<Position, ExitInfo>,
    in_flight_exits: BTreeMap<H256, InFlightExitInfo>,
    competitors: BTreeMap<H256, CompetitorInfo>,
}

impl Core {
    /// Creates an empty core.
    pub fn new(params: &WatcherParams) -> Self {
        Core {
            sla_margin: params.sla_margin,
            exits: BTreeMap::new(),
            in_flight_exits: BTreeMap::new(),
            competitors: BTreeMap::new(),
        }
    }

    /// Rebuilds the core from persisted state at startup.
    pub fn init(persisted: &PersistedState, params: &WatcherParams) -> Result<Self, CoreError> {
        let mut core = Core::new(params);

        for (packed, blob) in &persisted.exits {
            let position = Position::decode(*packed)
                .map_err(|_| CoreError::MalformedPosition(*packed))?;
            core.exits.insert(position, ExitInfo::from_blob(blob));
        }
        for (tx_hash, blob) in &persisted.in_flight_exits {
            core.in_flight_exits
                .insert(*tx_hash, InFlightExitInfo::from_blob(blob)?);
        }
        for (tx_hash, blob) in &persisted.competitors {
            core.competitors
                .insert(*tx_hash, CompetitorInfo::from_blob(blob)?);
        }

        info!(
            exits = core.exits.len(),
            in_flight_exits = core.in_flight_exits.len(),
            competitors = core.competitors.len(),
            "exit processor state restored"
        );
        Ok(core)
    }

    /// The SLA margin in root-chain blocks.
    pub fn sla_margin(&self) -> u64 {
        self.sla_margin
    }

    /// The tracked standard exits.
    pub fn exits(&self) -> &BTreeMap<Position, ExitInfo> {
        &self.exits
    }

    /// The tracked in-flight exits.
    pub fn in_flight_exits(&self) -> &BTreeMap<H256, InFlightExitInfo> {
        &self.in_flight_exits
    }

    /// The tracked competitors.
    pub fn competitors(&self) -> &BTreeMap<H256, CompetitorInfo> {
        &self.competitors
    }

    // In-memory mutation of inclusion witnesses happens in the canonicity module.
    pub(crate) fn in_flight_exits_mut(&mut self) -> &mut BTreeMap<H256, InFlightExitInfo> {
        &mut self.in_flight_exits
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Tracks newly started standard exits.
    ///
    /// Events and contract statuses come in matching order from the driver; a length
    /// mismatch means the two root-chain reads tore and the whole batch is rejected.
    pub fn new_exits(
        &mut self,
        events: &[ExitStarted],
        statuses: &[StandardExitStatus],
    ) -> Result<Vec<DbUpdate>, CoreError> {
        if events.len() != statuses.len() {
            return Err(CoreError::UnexpectedEvents);
        }

        let mut updates = Vec::with_capacity(events.len());
        for (event, status) in events.iter().zip(statuses) {
            let (position, info) = ExitInfo::from_event(event, status)?;
            updates.push(DbUpdate::PutExit {
                position: position.encode(),
                exit: info.to_blob(),
            });
            // positions are unique on the contract; never overwrite
            self.exits.entry(position).or_insert(info);
        }

        debug!(count = events.len(), "tracking new standard exits");
        Ok(updates)
    }

    /// Tracks newly started in-flight exits.
    pub fn new_in_flight_exits(
        &mut self,
        events: &[InFlightExitStarted],
        statuses: &[InFlightExitStatus],
    ) -> Result<Vec<DbUpdate>, CoreError> {
        if events.len() != statuses.len() {
            return Err(CoreError::UnexpectedEvents);
        }

        let mut updates = Vec::with_capacity(events.len());
        for (event, status) in events.iter().zip(statuses) {
            let ife = InFlightExitInfo::from_event(event, status)?;
            let tx_hash = ife.raw_hash();
            updates.push(DbUpdate::PutInFlightExit {
                tx_hash,
                exit: ife.to_blob(),
            });
            self.in_flight_exits.entry(tx_hash).or_insert(ife);
        }

        debug!(count = events.len(), "tracking new in-flight exits");
        Ok(updates)
    }

    /// Records piggybacks on in-flight exit slots. Piggybacking an already-piggybacked
    /// slot is a no-op; a piggyback on an unknown exit is a hard error.
    pub fn new_piggybacks(
        &mut self,
        piggybacks: &[PiggybackEvent],
    ) -> Result<Vec<DbUpdate>, CoreError> {
        let mut updates = Vec::new();
        for piggyback in piggybacks {
            let ife = self
                .in_flight_exits
                .get_mut(&piggyback.tx_hash)
                .ok_or(CoreError::IfeNotKnownForTx {
                    tx_hash: piggyback.tx_hash,
                })?;
            if (piggyback.output_index as usize) >= MAX_INPUTS + MAX_OUTPUTS {
                warn!(
                    index = piggyback.output_index,
                    "ignoring piggyback with out-of-range slot"
                );
                continue;
            }
            if ife.piggyback(piggyback.output_index) {
                updates.push(DbUpdate::PutInFlightExit {
                    tx_hash: piggyback.tx_hash,
                    exit: ife.to_blob(),
                });
            }
        }
        Ok(updates)
    }

    /// Clears piggybacks successfully challenged on the contract. Unknown exits and
    /// slots that were never piggybacked are silently skipped.
    pub fn challenge_piggybacks(&mut self, challenges: &[PiggybackEvent]) -> Vec<DbUpdate> {
        let mut updates = Vec::new();
        for challenge in challenges {
            let Some(ife) = self.in_flight_exits.get_mut(&challenge.tx_hash) else {
                continue;
            };
            if (challenge.output_index as usize) >= MAX_INPUTS + MAX_OUTPUTS {
                continue;
            }
            if ife.challenge_piggyback(challenge.output_index) {
                updates.push(DbUpdate::PutInFlightExit {
                    tx_hash: challenge.tx_hash,
                    exit: ife.to_blob(),
                });
            }
        }
        updates
    }

    /// Drops standard exits successfully challenged on the contract. Unknown positions
    /// are silently skipped, which makes replays harmless.
    pub fn challenge_exits(&mut self, challenges: &[ExitChallenged]) -> Vec<DbUpdate> {
        let mut updates = Vec::new();
        for challenge in challenges {
            let Ok(position) = Position::decode(challenge.utxo_pos) else {
                warn!(packed = challenge.utxo_pos, "ignoring challenge with malformed position");
                continue;
            };
            if self.exits.remove(&position).is_some() {
                updates.push(DbUpdate::DeleteExit {
                    position: position.encode(),
                });
            }
        }
        updates
    }

    /// Settles finalized standard exits.
    ///
    /// Valid finalizations surface an [`Event::ExitFinalized`] trigger and drop the
    /// record. Invalid finalizations re-activate the exit so it keeps producing
    /// byzantine events forever.
    pub fn finalize_exits(
        &mut self,
        valid: &[Position],
        invalid: &[Position],
    ) -> (Vec<Event>, Vec<DbUpdate>) {
        let mut events = Vec::new();
        let mut updates = Vec::new();

        for position in valid {
            if let Some(info) = self.exits.remove(position) {
                info!(%position, "standard exit finalized");
                events.push(Event::ExitFinalized {
                    utxo_pos: *position,
                    owner: info.owner,
                    currency: info.currency,
                    amount: info.amount,
                });
                updates.push(DbUpdate::DeleteExit {
                    position: position.encode(),
                });
            }
        }

        for position in invalid {
            if let Some(info) = self.exits.get_mut(position) {
                warn!(%position, "invalid standard exit finalized on the contract");
                if !info.is_active {
                    info.is_active = true;
                    updates.push(DbUpdate::PutExit {
                        position: position.encode(),
                        exit: info.to_blob(),
                    });
                }
            }
        }

        (events, updates)
    }

    /// Records canonicity challenges presented against in-flight exits: the competitor
    /// becomes a known transaction and the exit stops being presumed canonical.
    pub fn new_ife_challenges(
        &mut self,
        events: &[IfeChallenged],
    ) -> Result<Vec<DbUpdate>, CoreError> {
        let mut updates = Vec::new();
        for event in events {
            if !self.in_flight_exits.contains_key(&event.tx_hash) {
                return Err(CoreError::IfeNotKnownForTx {
                    tx_hash: event.tx_hash,
                });
            }
            let competitor = CompetitorInfo::from_event(event)?;
            let competitor_position = Position::decode(event.competitor_position)
                .map_err(|_| CoreError::MalformedPosition(event.competitor_position))?;

            let ife = self
                .in_flight_exits
                .get_mut(&event.tx_hash)
                .expect("checked above");
            ife.is_canonical = false;
            ife.oldest_competitor = Some(competitor_position);
            updates.push(DbUpdate::PutInFlightExit {
                tx_hash: event.tx_hash,
                exit: ife.to_blob(),
            });

            updates.push(DbUpdate::PutCompetitor {
                tx_hash: competitor.tx.raw_hash(),
                competitor: competitor.to_blob(),
            });
            self.competitors.insert(competitor.tx.raw_hash(), competitor);
        }
        Ok(updates)
    }

    /// Records canonicity responses the contract accepted: the exiter proved inclusion,
    /// so the exit is presumed canonical again.
    pub fn respond_to_in_flight_exits_challenges(
        &mut self,
        events: &[IfeChallengeResponded],
    ) -> Result<Vec<DbUpdate>, CoreError> {
        let mut updates = Vec::new();
        for event in events {
            let ife = self
                .in_flight_exits
                .get_mut(&event.tx_hash)
                .ok_or(CoreError::IfeNotKnownForTx {
                    tx_hash: event.tx_hash,
                })?;
            if !ife.is_canonical {
                ife.is_canonical = true;
                ife.oldest_competitor = None;
                updates.push(DbUpdate::PutInFlightExit {
                    tx_hash: event.tx_hash,
                    exit: ife.to_blob(),
                });
            }
        }
        Ok(updates)
    }

    /// Settles finalized in-flight exit slots.
    ///
    /// Validates the whole batch before touching anything: every identifier must
    /// resolve to a known exit and every slot must be piggybacked. After finalization
    /// the exit goes inactive, unless `invalidities` names it with a non-empty list of
    /// byzantine events, in which case it is forced active so it keeps producing them.
    pub fn finalize_in_flight_exits(
        &mut self,
        finalizations: &[IfeFinalized],
        invalidities: &BTreeMap<ContractId, Vec<Event>>,
    ) -> Result<Vec<DbUpdate>, CoreError> {
        let by_id = self.validate_finalizations(finalizations)?;

        let mut touched = BTreeSet::new();
        for finalization in finalizations {
            let tx_hash = by_id[&finalization.contract_id];
            let ife = self
                .in_flight_exits
                .get_mut(&tx_hash)
                .expect("validated above");
            if ife.is_active {
                ife.finalize_slot(finalization.output_index);
                touched.insert(tx_hash);
            }
        }

        for finalization in finalizations {
            let tx_hash = by_id[&finalization.contract_id];
            let ife = self
                .in_flight_exits
                .get_mut(&tx_hash)
                .expect("validated above");
            if ife.is_active {
                info!(contract_id = ?finalization.contract_id, "in-flight exit finalized");
                ife.is_active = false;
                touched.insert(tx_hash);
            }
        }

        for (contract_id, invalidity_events) in invalidities {
            if invalidity_events.is_empty() {
                continue;
            }
            if let Some(tx_hash) = by_id.get(contract_id) {
                let ife = self
                    .in_flight_exits
                    .get_mut(tx_hash)
                    .expect("validated above");
                warn!(
                    contract_id = ?contract_id,
                    "invalid in-flight exit finalized on the contract"
                );
                ife.is_active = true;
                touched.insert(*tx_hash);
            }
        }

        Ok(touched
            .into_iter()
            .map(|tx_hash| DbUpdate::PutInFlightExit {
                tx_hash,
                exit: self.in_flight_exits[&tx_hash].to_blob(),
            })
            .collect())
    }

    /// Dry run of [`Core::finalize_in_flight_exits`]: the positions each finalization
    /// would exit, keyed by contract identifier. Input slots exit the transaction's
    /// input position; output slots exit `(tx hash, slot)`.
    pub fn prepare_utxo_exits_for_in_flight_exit_finalizations(
        &self,
        finalizations: &[IfeFinalized],
    ) -> Result<BTreeMap<ContractId, IfeExitSlots>, CoreError> {
        let by_id = self.validate_finalizations(finalizations)?;

        let mut slots_by_id: BTreeMap<ContractId, IfeExitSlots> = BTreeMap::new();
        for finalization in finalizations {
            let tx_hash = by_id[&finalization.contract_id];
            let ife = &self.in_flight_exits[&tx_hash];
            let slots = slots_by_id.entry(finalization.contract_id).or_default();

            if Position::is_input_slot(finalization.output_index) {
                match ife.tx.raw.inputs.get(finalization.output_index as usize) {
                    Some(input) => slots.inputs.push(*input),
                    None => warn!(
                        index = finalization.output_index,
                        "finalized input slot beyond the transaction's inputs"
                    ),
                }
            } else {
                slots.outputs.push((tx_hash, finalization.output_index));
            }
        }
        Ok(slots_by_id)
    }

    // Both finalization entry points share the two-phase validation.
    fn validate_finalizations(
        &self,
        finalizations: &[IfeFinalized],
    ) -> Result<BTreeMap<ContractId, H256>, CoreError> {
        let by_id: BTreeMap<ContractId, H256> = self
            .in_flight_exits
            .iter()
            .map(|(tx_hash, ife)| (ife.contract_id, *tx_hash))
            .collect();

        let unknown: BTreeSet<ContractId> = finalizations
            .iter()
            .filter(|finalization| !by_id.contains_key(&finalization.contract_id))
            .map(|finalization| finalization.contract_id)
            .collect();
        if !unknown.is_empty() {
            return Err(CoreError::UnknownInFlightExit { ids: unknown });
        }

        let unknown_piggybacks: Vec<(ContractId, u8)> = finalizations
            .iter()
            .filter(|finalization| {
                let ife = &self.in_flight_exits[&by_id[&finalization.contract_id]];
                !ife.is_piggybacked(finalization.output_index)
            })
            .map(|finalization| (finalization.contract_id, finalization.output_index))
            .collect();
        if !unknown_piggybacks.is_empty() {
            return Err(CoreError::UnknownPiggybacks {
                slots: unknown_piggybacks,
            });
        }

        Ok(by_id)
    }

    // ------------------------------------------------------------------
    // Query planning
    // ------------------------------------------------------------------

    /// Plans the UTXO existence queries for a validity cycle: every position an active
    /// standard exit, an active in-flight exit input or an active piggybacked output
    /// claims, bounded to the already-formed part of the child chain.
    pub fn determine_utxo_existence_to_get(&self, request: &mut Request) {
        let mut positions: Vec<Position> = self
            .exits
            .iter()
            .filter(|(_, exit)| exit.is_active)
            .map(|(position, _)| *position)
            .collect();

        for ife in self.in_flight_exits.values().filter(|ife| ife.is_active) {
            positions.extend(ife.tx.raw.inputs.iter().copied());
            positions.extend(ife.piggybacked_output_positions());
        }

        request.utxos_to_check = positions
            .into_iter()
            .filter(|position| position.blknum > 0 && position.blknum < request.blknum_now)
            .sorted()
            .dedup()
            .collect();
        debug!(
            count = request.utxos_to_check.len(),
            "planned utxo existence queries"
        );
    }

    /// Plans existence queries for the inputs of active in-flight exits that carry at
    /// least one piggybacked output: an output piggyback is only valid if the inputs
    /// were never spent elsewhere.
    pub fn determine_ife_input_utxos_existence_to_get(&self, request: &mut Request) {
        request.ife_input_utxos_to_check = self
            .in_flight_exits
            .values()
            .filter(|ife| ife.is_active && ife.piggybacked_outputs != 0)
            .flat_map(|ife| ife.tx.raw.inputs.iter().copied())
            .filter(|position| position.blknum > 0 && position.blknum < request.blknum_now)
            .sorted()
            .dedup()
            .collect();
    }

    /// Plans the spend queries once the ledger has answered existence: every in-flight
    /// input or piggybacked output that was checked and reported missing. A position
    /// that was never checked is treated as existing.
    pub fn determine_spends_to_get(&self, request: &mut Request) {
        let exists = request.utxo_exists_map();

        let mut positions: Vec<Position> = Vec::new();
        for ife in self.in_flight_exits.values().filter(|ife| ife.is_active) {
            positions.extend(ife.tx.raw.inputs.iter().copied());
            positions.extend(ife.piggybacked_output_positions());
        }

        request.spends_to_get = positions
            .into_iter()
            .filter(|position| exists.get(position) == Some(&false))
            .sorted()
            .dedup()
            .collect();
    }

    /// As [`Core::determine_spends_to_get`], for the in-flight input phase.
    pub fn determine_ife_input_spends_to_get(&self, request: &mut Request) {
        let exists = request.ife_input_utxo_exists_map();
        request.ife_input_spends_to_get = request
            .ife_input_utxos_to_check
            .iter()
            .copied()
            .filter(|position| exists.get(position) == Some(&false))
            .collect();
    }

    /// Distils the ledger's spend answers into the block numbers to fetch. A `None`
    /// legitimately arises when a UTXO was removed by an exit finalization rather than
    /// by a spend; those are dropped with a warning.
    pub fn handle_spent_blknum_result(
        spends: &[Position],
        results: &[Option<u64>],
    ) -> Vec<u64> {
        let mut blknums = Vec::new();
        for (position, result) in spends.iter().zip(results) {
            match result {
                Some(blknum) => blknums.push(*blknum),
                None => warn!(
                    %position,
                    "no spend recorded for a missing utxo; likely consumed by an exit"
                ),
            }
        }
        blknums.into_iter().sorted().dedup().collect()
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::{Address, U256};
    use plasma_watcher_db::InMemoryPersistence;
    use plasma_watcher_db::Persistence;

    use crate::testing::fixtures;

    use super::*;

    #[test]
    fn new_exits_rejects_torn_batches() {
        let mut core = fixtures::core();
        let (event, _) = fixtures::exit_started(Position::new(1000, 0, 0), 0xaa, 10, 100);
        assert_eq!(
            core.new_exits(&[event], &[]),
            Err(CoreError::UnexpectedEvents)
        );
    }

    #[test]
    fn happy_finalization() {
        // seed scenario: one active exit, finalized valid
        let mut core = fixtures::core();
        let position = Position::new(1000, 0, 0);
        fixtures::add_exit(&mut core, position, 0xaa, 10, 100);

        let (events, updates) = core.finalize_exits(&[position], &[]);

        assert_eq!(
            events,
            vec![Event::ExitFinalized {
                utxo_pos: position,
                owner: Address::repeat_byte(0xaa),
                currency: Address::zero(),
                amount: U256::from(10),
            }]
        );
        assert!(core.exits().is_empty());
        assert_eq!(
            updates,
            vec![DbUpdate::DeleteExit {
                position: position.encode()
            }]
        );
    }

    #[test]
    fn invalid_finalization_reactivates_forever() {
        let mut core = fixtures::core();
        let position = Position::new(1000, 0, 0);
        fixtures::add_exit(&mut core, position, 0xaa, 10, 100);

        // successfully challenged on our side first: the exit goes inactive
        core.exits.get_mut(&position).unwrap().is_active = false;

        let (events, updates) = core.finalize_exits(&[], &[position]);
        assert!(events.is_empty());
        assert_eq!(updates.len(), 1);
        assert!(core.exits()[&position].is_active);

        // finalizing again emits no further writes; the record stays active
        let (_, updates) = core.finalize_exits(&[], &[position]);
        assert!(updates.is_empty());
        assert!(core.exits()[&position].is_active);
    }

    #[test]
    fn challenge_exits_is_idempotent_on_unknown_positions() {
        let mut core = fixtures::core();
        let updates = core.challenge_exits(&[ExitChallenged {
            utxo_pos: Position::new(9000, 0, 0).encode(),
        }]);
        assert!(updates.is_empty());
    }

    #[test]
    fn piggyback_then_challenge_then_replay() {
        // seed scenario: piggyback output slot 0, challenge it, replay the challenge
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);

        let updates = core
            .new_piggybacks(&[PiggybackEvent {
                tx_hash,
                output_index: 4,
            }])
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert!(core.in_flight_exits()[&tx_hash].is_piggybacked(4));

        // replaying the piggyback is a no-op
        let updates = core
            .new_piggybacks(&[PiggybackEvent {
                tx_hash,
                output_index: 4,
            }])
            .unwrap();
        assert!(updates.is_empty());

        let updates = core.challenge_piggybacks(&[PiggybackEvent {
            tx_hash,
            output_index: 4,
        }]);
        assert_eq!(updates.len(), 1);
        assert!(!core.in_flight_exits()[&tx_hash].is_piggybacked(4));

        let updates = core.challenge_piggybacks(&[PiggybackEvent {
            tx_hash,
            output_index: 4,
        }]);
        assert!(updates.is_empty());
    }

    #[test]
    fn piggyback_on_unknown_ife_fails_hard() {
        let mut core = fixtures::core();
        let tx_hash = H256::repeat_byte(0x77);
        assert_eq!(
            core.new_piggybacks(&[PiggybackEvent {
                tx_hash,
                output_index: 0
            }]),
            Err(CoreError::IfeNotKnownForTx { tx_hash })
        );
    }

    #[test]
    fn unknown_finalization_does_not_mutate() {
        // seed scenario: finalizing an unknown in-flight exit id
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        fixtures::add_ife(&mut core, &signed);

        let unknown = fixtures::contract_id(0x99);
        let before = core.clone();
        let result = core.finalize_in_flight_exits(
            &[IfeFinalized {
                contract_id: unknown,
                output_index: 4,
            }],
            &BTreeMap::new(),
        );

        assert_eq!(
            result,
            Err(CoreError::UnknownInFlightExit {
                ids: [unknown].into_iter().collect()
            })
        );
        assert_eq!(core.in_flight_exits(), before.in_flight_exits());
    }

    #[test]
    fn finalization_requires_piggybacked_slots() {
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);
        let contract_id = core.in_flight_exits()[&tx_hash].contract_id;

        let result = core.finalize_in_flight_exits(
            &[IfeFinalized {
                contract_id,
                output_index: 4,
            }],
            &BTreeMap::new(),
        );
        assert_eq!(
            result,
            Err(CoreError::UnknownPiggybacks {
                slots: vec![(contract_id, 4)]
            })
        );
    }

    #[test]
    fn finalization_deactivates_unless_invalid() {
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);
        let contract_id = core.in_flight_exits()[&tx_hash].contract_id;
        core.new_piggybacks(&[PiggybackEvent {
            tx_hash,
            output_index: 4,
        }])
        .unwrap();

        let finalizations = [IfeFinalized {
            contract_id,
            output_index: 4,
        }];
        core.finalize_in_flight_exits(&finalizations, &BTreeMap::new())
            .unwrap();
        assert!(!core.in_flight_exits()[&tx_hash].is_active);

        // an invalid finalization instead forces the exit to stay active
        let mut core2 = fixtures::core();
        let tx_hash = fixtures::add_ife(&mut core2, &signed);
        core2
            .new_piggybacks(&[PiggybackEvent {
                tx_hash,
                output_index: 4,
            }])
            .unwrap();
        let invalidities = [(
            contract_id,
            vec![Event::NonCanonicalIfe {
                txbytes: signed.raw.encode(),
            }],
        )]
        .into_iter()
        .collect();
        core2
            .finalize_in_flight_exits(&finalizations, &invalidities)
            .unwrap();
        assert!(core2.in_flight_exits()[&tx_hash].is_active);
    }

    #[test]
    fn prepare_finalizations_splits_inputs_and_outputs() {
        let mut core = fixtures::core();
        let input = Position::new(1000, 0, 0);
        let signed = fixtures::signed_tx(vec![input], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);
        let contract_id = core.in_flight_exits()[&tx_hash].contract_id;
        core.new_piggybacks(&[
            PiggybackEvent {
                tx_hash,
                output_index: 0,
            },
            PiggybackEvent {
                tx_hash,
                output_index: 4,
            },
        ])
        .unwrap();

        let slots = core
            .prepare_utxo_exits_for_in_flight_exit_finalizations(&[
                IfeFinalized {
                    contract_id,
                    output_index: 0,
                },
                IfeFinalized {
                    contract_id,
                    output_index: 4,
                },
            ])
            .unwrap();

        assert_eq!(slots[&contract_id].inputs, vec![input]);
        assert_eq!(slots[&contract_id].outputs, vec![(tx_hash, 4)]);
    }

    #[test]
    fn ife_challenge_flips_canonicity_and_response_restores_it() {
        let mut core = fixtures::core();
        let shared = Position::new(1000, 0, 0);
        let ife_tx = fixtures::signed_tx(vec![shared], vec![(0xaa, 10)], &[1]);
        let competitor_tx = fixtures::signed_tx(vec![shared], vec![(0xbb, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &ife_tx);

        let updates = core
            .new_ife_challenges(&[fixtures::ife_challenge(tx_hash, &competitor_tx, 0)])
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert!(!core.in_flight_exits()[&tx_hash].is_canonical);
        assert!(core.competitors().contains_key(&competitor_tx.raw.raw_hash()));

        core.respond_to_in_flight_exits_challenges(&[IfeChallengeResponded { tx_hash }])
            .unwrap();
        assert!(core.in_flight_exits()[&tx_hash].is_canonical);
        assert_eq!(core.in_flight_exits()[&tx_hash].oldest_competitor, None);
    }

    #[test]
    fn ife_challenge_on_unknown_ife_fails_hard() {
        let mut core = fixtures::core();
        let competitor_tx =
            fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xbb, 10)], &[1]);
        let tx_hash = H256::repeat_byte(0x13);
        assert_eq!(
            core.new_ife_challenges(&[fixtures::ife_challenge(tx_hash, &competitor_tx, 0)]),
            Err(CoreError::IfeNotKnownForTx { tx_hash })
        );
    }

    #[test]
    fn state_survives_a_restart_through_persistence() {
        let mut core = fixtures::core();
        let position = Position::new(1000, 0, 0);
        fixtures::add_exit(&mut core, position, 0xaa, 10, 100);
        let signed = fixtures::signed_tx(vec![Position::new(2000, 0, 0)], vec![(0xbb, 5)], &[2]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);

        let mut store = InMemoryPersistence::new();
        let mut all_updates = Vec::new();
        let (event, status) = fixtures::exit_started(position, 0xaa, 10, 100);
        let mut replay = fixtures::core();
        all_updates.extend(replay.new_exits(&[event], &[status]).unwrap());
        let (event, status) = fixtures::ife_started(&signed);
        all_updates.extend(replay.new_in_flight_exits(&[event], &[status]).unwrap());
        store.apply(&all_updates).unwrap();

        let restored = Core::init(&store.load_state().unwrap(), &fixtures::params()).unwrap();
        assert_eq!(restored.exits(), core.exits());
        assert_eq!(
            restored.in_flight_exits()[&tx_hash].tx,
            core.in_flight_exits()[&tx_hash].tx
        );
    }

    #[test]
    fn existence_planning_bounds_and_dedups() {
        let mut core = fixtures::core();
        fixtures::add_exit(&mut core, Position::new(1000, 0, 0), 0xaa, 10, 100);
        fixtures::add_exit(&mut core, Position::new(5000, 0, 0), 0xbb, 10, 100);

        // the in-flight exit shares the first exit's position as an input
        let signed = fixtures::signed_tx(
            vec![Position::new(1000, 0, 0), Position::new(3000, 1, 2)],
            vec![(0xcc, 10)],
            &[1, 2],
        );
        fixtures::add_ife(&mut core, &signed);

        let mut request = Request::new(200, 4000);
        core.determine_utxo_existence_to_get(&mut request);

        // 5000 lies beyond the horizon; 1000 appears once
        assert_eq!(
            request.utxos_to_check,
            vec![Position::new(1000, 0, 0), Position::new(3000, 1, 2)]
        );
    }

    #[test]
    fn spend_planning_covers_only_missing_checked_utxos() {
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(
            vec![Position::new(1000, 0, 0), Position::new(2000, 0, 0)],
            vec![(0xaa, 10)],
            &[1, 1],
        );
        fixtures::add_ife(&mut core, &signed);

        let mut request = Request::new(200, 4000);
        core.determine_utxo_existence_to_get(&mut request);
        request.utxo_exists_result = vec![false, true];
        core.determine_spends_to_get(&mut request);

        assert_eq!(request.spends_to_get, vec![Position::new(1000, 0, 0)]);
    }

    #[test]
    fn ife_input_planning_requires_piggybacked_outputs() {
        let mut core = fixtures::core();
        let signed = fixtures::signed_tx(vec![Position::new(1000, 0, 0)], vec![(0xaa, 10)], &[1]);
        let tx_hash = fixtures::add_ife(&mut core, &signed);

        let mut request = Request::new(200, 4000);
        core.determine_ife_input_utxos_existence_to_get(&mut request);
        assert!(request.ife_input_utxos_to_check.is_empty());

        core.new_piggybacks(&[PiggybackEvent {
            tx_hash,
            output_index: 4,
        }])
        .unwrap();
        core.determine_ife_input_utxos_existence_to_get(&mut request);
        assert_eq!(
            request.ife_input_utxos_to_check,
            vec![Position::new(1000, 0, 0)]
        );
    }

    #[test]
    fn spent_blknum_results_drop_not_found() {
        let spends = [Position::new(1000, 0, 0), Position::new(2000, 0, 0)];
        let results = [Some(3000), None];
        assert_eq!(
            Core::handle_spent_blknum_result(&spends, &results),
            vec![3000]
        );
    }
}
