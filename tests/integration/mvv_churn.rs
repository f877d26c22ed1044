#![allow(missing_docs)]

use std::collections::HashMap;

use mvv::storage::mvv::{
    exact_required_length, fetch_version, prune, prune_with, store_version, verify_mvv,
    visit_all_versions, Occupancy, VersionList, TYPE_ANTIVALUE,
};
use mvv::storage::{CommitStatus, PruneOptions, TxnTable, VisibilityOracle, UNCOMMITTED};
use mvv::types::{MvvError, Result, Timestamp, VersionHandle};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const CHURN_STEPS: usize = 2_000;

struct Slot {
    page: Vec<u8>,
    offset: usize,
    occupancy: Occupancy,
}

impl Slot {
    fn with_initial(offset: usize, capacity: usize, initial: Option<&[u8]>) -> Self {
        let mut page = vec![0u8; offset + capacity];
        let occupancy = match initial {
            None => Occupancy::Unused,
            Some([]) => Occupancy::Undefined,
            Some(value) => {
                page[offset..offset + value.len()].copy_from_slice(value);
                Occupancy::Bytes(value.len())
            }
        };
        Self {
            page,
            offset,
            occupancy,
        }
    }

    fn len(&self) -> usize {
        self.occupancy.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.page[self.offset..self.offset + self.len()]
    }

    fn store(&mut self, limit: usize, version: VersionHandle, value: &[u8]) -> Result<bool> {
        let out = store_version(
            &mut self.page,
            self.offset,
            self.occupancy,
            limit,
            version,
            value,
        )?;
        self.occupancy = Occupancy::Bytes(out.length);
        Ok(out.existed)
    }

    fn fetch(&self, version: VersionHandle) -> Result<Option<Vec<u8>>> {
        let mut out = vec![0u8; self.len().max(1)];
        let found = fetch_version(&self.page, self.offset, self.len(), version, &mut out)?;
        Ok(found.map(|len| out[..len].to_vec()))
    }

    fn versions(&self) -> Result<VersionList> {
        let mut list = VersionList::default();
        visit_all_versions(&mut list, &self.page, self.offset, self.occupancy)?;
        Ok(list)
    }

    /// Value a reader starting now would see: the committed version with the
    /// newest commit timestamp.
    fn read_latest<O: VisibilityOracle>(&self, oracle: &O) -> Result<Option<Vec<u8>>> {
        if self.bytes() == [TYPE_ANTIVALUE] {
            return Ok(None);
        }
        let mut best: Option<(Timestamp, Vec<u8>)> = None;
        for v in self.versions()?.versions {
            if let CommitStatus::Committed(tc) = oracle.commit_status(v.version, UNCOMMITTED, 0)? {
                if best.as_ref().map_or(true, |(seen, _)| tc >= *seen) {
                    let value = self.page[v.value_offset..v.value_offset + v.value_len].to_vec();
                    best = Some((tc, value));
                }
            }
        }
        Ok(best.map(|(_, value)| value))
    }

    fn prune(&mut self, table: &TxnTable, convert: bool) -> Result<()> {
        let before = self.len();
        let new_len = prune_with(&mut self.page, self.offset, before, table, convert)?;
        assert!(new_len <= before, "prune grew slot from {before} to {new_len}");
        self.occupancy = Occupancy::Bytes(new_len);
        Ok(())
    }
}

fn random_value(rng: &mut ChaCha8Rng) -> Vec<u8> {
    let len = rng.gen_range(0..=16);
    (0..len).map(|_| rng.gen()).collect()
}

#[test]
fn sequential_writers_with_readers_keep_latest_committed_value() -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5EED_F00D);
    let table = TxnTable::new();
    let mut slot = Slot::with_initial(8, 512, Some(b"seed"));
    let limit = slot.page.len();
    let mut latest = b"seed".to_vec();
    let mut readers: Vec<Timestamp> = Vec::new();
    let mut next_ts: Timestamp = 1;
    let mut capacity_errors = 0usize;

    for _ in 0..CHURN_STEPS {
        if rng.gen_bool(0.2) {
            table.begin(next_ts)?;
            readers.push(next_ts);
            next_ts += 1;
        }

        let ts = next_ts;
        next_ts += 1;
        table.begin(ts)?;
        let version = VersionHandle::new(ts, 0);
        let mut written = None;
        for _ in 0..rng.gen_range(1..=2) {
            let value = random_value(&mut rng);
            let before = slot.bytes().to_vec();
            match slot.store(limit, version, &value) {
                Ok(existed) => {
                    assert_eq!(existed, written.is_some());
                    if !existed {
                        table.record_mvv(version)?;
                    }
                    written = Some(value);
                }
                Err(MvvError::Capacity { .. }) => {
                    assert_eq!(slot.bytes(), before.as_slice());
                    capacity_errors += 1;
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        if rng.gen_bool(0.3) {
            slot.prune(&table, rng.gen_bool(0.5))?;
            assert_eq!(slot.read_latest(&table)?.as_deref(), Some(latest.as_slice()));
            if let Some(value) = &written {
                assert_eq!(slot.fetch(version)?.as_ref(), Some(value));
            }
        }

        match written {
            Some(value) if rng.gen_bool(0.8) => {
                table.commit(ts, ts)?;
                latest = value;
            }
            _ => table.abort(ts)?,
        }

        let mut still_running = Vec::with_capacity(readers.len());
        for reader in readers.drain(..) {
            if rng.gen_bool(0.4) {
                table.commit(reader, ts)?;
            } else {
                still_running.push(reader);
            }
        }
        readers = still_running;

        if rng.gen_bool(0.5) {
            slot.prune(&table, true)?;
        }
        assert_eq!(slot.read_latest(&table)?.as_deref(), Some(latest.as_slice()));
        verify_mvv(&slot.page, slot.offset, slot.occupancy)?;
        table.release_aborted();
    }

    for reader in readers {
        table.commit(reader, next_ts)?;
    }
    slot.prune(&table, true)?;
    assert_eq!(slot.read_latest(&table)?.as_deref(), Some(latest.as_slice()));
    assert_eq!(verify_mvv(&slot.page, slot.offset, slot.occupancy)?.versions, 1);
    assert_eq!(table.active_count(), 0);
    assert!(capacity_errors < CHURN_STEPS / 10, "{capacity_errors} capacity errors");
    Ok(())
}

#[derive(Clone, Debug)]
enum Fate {
    Committed,
    Aborted,
}

fn initial_value() -> impl Strategy<Value = Option<Vec<u8>>> {
    prop_oneof![
        Just(None),
        Just(Some(Vec::new())),
        prop::collection::vec(0u8..=0xFD, 1..12).prop_map(Some),
    ]
}

fn fate() -> impl Strategy<Value = Fate> {
    prop_oneof![3 => Just(Fate::Committed), 1 => Just(Fate::Aborted)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn stores_match_a_map_model(
        offset in 0usize..16,
        initial in initial_value(),
        ops in prop::collection::vec((1u64..=6, prop::collection::vec(any::<u8>(), 0..32)), 1..24),
    ) {
        let mut slot = Slot::with_initial(offset, 1024, initial.as_deref());
        let limit = slot.page.len();
        let mut model: HashMap<VersionHandle, Vec<u8>> = HashMap::new();
        for (raw, value) in ops {
            let version = VersionHandle(raw);
            let expected =
                exact_required_length(&slot.page, offset, slot.occupancy, version, value.len())
                    .unwrap();
            let existed = slot.store(limit, version, &value).unwrap();
            prop_assert_eq!(existed, model.contains_key(&version));
            prop_assert_eq!(slot.len(), expected);
            model.insert(version, value);
        }
        for (version, value) in &model {
            let fetched = slot.fetch(*version).unwrap();
            prop_assert_eq!(fetched.as_ref(), Some(value));
        }
        let seen = slot.versions().unwrap().versions.len();
        prop_assert_eq!(seen, model.len() + usize::from(initial.is_some()));
        if let Some(value) = &initial {
            let fetched = slot.fetch(VersionHandle::PRIMORDIAL).unwrap();
            prop_assert_eq!(fetched.as_ref(), Some(value));
        }
        let report = verify_mvv(&slot.page, offset, slot.occupancy).unwrap();
        prop_assert_eq!(report.versions, seen);
    }

    #[test]
    fn capacity_is_checked_before_writing(
        existing in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..20), 1..5),
        version in 1u64..=6,
        value in prop::collection::vec(any::<u8>(), 0..40),
        slack in 0usize..48,
    ) {
        let mut slot = Slot::with_initial(4, 512, None);
        for (i, v) in existing.iter().enumerate() {
            slot.store(512, VersionHandle(i as u64 + 1), v).unwrap();
        }
        let limit = slot.offset + slot.len() + slack;
        let needed = exact_required_length(
            &slot.page,
            slot.offset,
            slot.occupancy,
            VersionHandle(version),
            value.len(),
        )
        .unwrap();
        let before = slot.page.clone();
        match slot.store(limit, VersionHandle(version), &value) {
            Ok(_) => {
                prop_assert!(slot.offset + needed <= limit);
                prop_assert_eq!(slot.len(), needed);
                prop_assert!(slot.page[limit..].iter().all(|b| *b == 0));
            }
            Err(MvvError::Capacity { needed: reported, limit: reported_limit }) => {
                prop_assert!(slot.offset + needed > limit);
                prop_assert!(reported > reported_limit);
                prop_assert_eq!(&slot.page, &before);
            }
            Err(err) => prop_assert!(false, "unexpected error {err:?}"),
        }
    }

    #[test]
    fn prune_shrinks_and_keeps_what_readers_need(
        fates in prop::collection::vec(fate(), 1..8),
        running_writer in any::<bool>(),
        readers in prop::collection::vec(any::<bool>(), 8),
        convert in any::<bool>(),
    ) {
        // Writers take even timestamps and readers the odd ones in between.
        let table = TxnTable::new();
        let mut slot = Slot::with_initial(0, 512, None);
        let mut latest = None;
        for (i, fate) in fates.iter().enumerate() {
            let ts = 2 * i as u64 + 2;
            if readers[i] {
                table.begin(ts - 1).unwrap();
            }
            table.begin(ts).unwrap();
            let value = ts.to_be_bytes();
            slot.store(512, VersionHandle::new(ts, 0), &value).unwrap();
            match fate {
                Fate::Committed => {
                    table.commit(ts, ts).unwrap();
                    latest = Some(value.to_vec());
                }
                Fate::Aborted => table.abort(ts).unwrap(),
            }
        }
        let pending = VersionHandle::new(2 * fates.len() as u64 + 2, 0);
        if running_writer {
            table.begin(pending.ts()).unwrap();
            slot.store(512, pending, b"pending").unwrap();
        }
        let before = slot.len();
        let new_len =
            prune(&mut slot.page, 0, before, &table, &PruneOptions::new().convert_to_primordial(convert))
                .unwrap();
        prop_assert!(new_len <= before);
        slot.occupancy = Occupancy::Bytes(new_len);
        verify_mvv(&slot.page, 0, slot.occupancy).unwrap();
        prop_assert_eq!(slot.read_latest(&table).unwrap(), latest);
        if running_writer {
            prop_assert_eq!(slot.fetch(pending).unwrap(), Some(b"pending".to_vec()));
        }
    }
}
