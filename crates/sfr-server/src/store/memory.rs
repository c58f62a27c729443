//! In-memory store implementation
//!
//! HashMap-backed [`ParcelStore`] used by the unit tests. Transactions are a
//! whole-state snapshot: `begin` clones, `rollback` restores, `commit` drops
//! the snapshot.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use super::model::{
    Bag, District, ManifestUpdate, NewParcel, NewTransition, Parcel, TransitionRecord,
};
use super::{ParcelStore, StoreError, StoreResult};
use sfr_common::{ParcelState, ReturnSubtype};

#[derive(Debug, Clone, Default)]
struct State {
    parcels: HashMap<String, Parcel>,
    bags: HashMap<String, Bag>,
    districts: HashMap<String, District>,
    transitions: Vec<TransitionRecord>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`ParcelStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: State,
    snapshot: Option<State>,
    broken: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: number of ledger entries for a parcel.
    pub fn ledger_len(&self, parcel_id: i64) -> usize {
        self.state
            .transitions
            .iter()
            .filter(|t| t.parcel_id == parcel_id)
            .count()
    }

    /// Test helper: make every write for this tracking code fail with a
    /// store error. Survives rollback, unlike the data itself.
    pub fn break_parcel(&mut self, tracking: &str) {
        self.broken.insert(tracking.to_string());
    }
}

#[async_trait]
impl ParcelStore for MemoryStore {
    async fn begin(&mut self) -> StoreResult<()> {
        if self.snapshot.is_some() {
            return Err(StoreError::Transaction("transaction already open".into()));
        }
        self.snapshot = Some(self.state.clone());
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StoreError::Transaction("no open transaction to commit".into()))
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        match self.snapshot.take() {
            Some(snapshot) => {
                self.state = snapshot;
                Ok(())
            },
            None => Err(StoreError::Transaction(
                "no open transaction to roll back".into(),
            )),
        }
    }

    async fn find_by_tracking_code(&mut self, tracking: &str) -> StoreResult<Option<Parcel>> {
        Ok(self.state.parcels.get(tracking).cloned())
    }

    async fn exists_by_tracking_code(&mut self, tracking: &str) -> StoreResult<bool> {
        Ok(self.state.parcels.contains_key(tracking))
    }

    async fn insert_parcel(&mut self, parcel: NewParcel) -> StoreResult<Parcel> {
        if self.state.parcels.contains_key(&parcel.tracking_code) {
            return Err(StoreError::Duplicate(format!(
                "parcel '{}' already exists",
                parcel.tracking_code
            )));
        }
        let id = self.state.next_id();
        let stored = Parcel {
            id,
            tracking_code: parcel.tracking_code.clone(),
            state: ParcelState::INITIAL,
            return_subtype: ReturnSubtype::default(),
            bag_id: parcel.bag_id,
            district_id: parcel.district_id,
            recipient_name: None,
            recipient_address: None,
            recipient_phone: None,
            declared_value: None,
            content_description: None,
            observations: None,
            manifest_responsible: None,
            received_at: parcel.received_at,
            delivered_at: None,
            returned_at: None,
            last_state_change_at: parcel.received_at,
            external_status: None,
            external_status_at: None,
            last_changed_by: Some(parcel.changed_by),
        };
        self.state
            .parcels
            .insert(parcel.tracking_code, stored.clone());
        Ok(stored)
    }

    async fn update_parcel(&mut self, parcel: &Parcel) -> StoreResult<()> {
        if self.broken.contains(&parcel.tracking_code) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        match self.state.parcels.get_mut(&parcel.tracking_code) {
            Some(slot) => {
                *slot = parcel.clone();
                Ok(())
            },
            None => Err(StoreError::NotFound(format!(
                "parcel '{}' not found",
                parcel.tracking_code
            ))),
        }
    }

    async fn batch_insert_ignore(&mut self, parcels: &[NewParcel]) -> StoreResult<Vec<String>> {
        let mut inserted = Vec::new();
        for parcel in parcels {
            if self.state.parcels.contains_key(&parcel.tracking_code) {
                continue;
            }
            self.insert_parcel(parcel.clone()).await?;
            inserted.push(parcel.tracking_code.clone());
        }
        Ok(inserted)
    }

    async fn batch_update_manifest(&mut self, updates: &[ManifestUpdate]) -> StoreResult<()> {
        for update in updates {
            let Some(parcel) = self.state.parcels.get_mut(&update.tracking_code) else {
                continue;
            };
            parcel.bag_id = update.bag_id;
            parcel.district_id = update.district_id;
            parcel.received_at = update.received_at;
            parcel.last_changed_by = Some(update.changed_by.clone());
            if update.observations.is_some() {
                parcel.observations = update.observations.clone();
            }
            if update.responsible.is_some() {
                parcel.manifest_responsible = update.responsible.clone();
            }
        }
        Ok(())
    }

    async fn delete_parcels(&mut self, trackings: &[String]) -> StoreResult<u64> {
        let mut deleted = 0;
        for tracking in trackings {
            if self.state.parcels.remove(tracking).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn find_or_create_bag(&mut self, seal: &str) -> StoreResult<Bag> {
        if let Some(bag) = self.state.bags.get(seal) {
            return Ok(bag.clone());
        }
        let bag = Bag {
            id: self.state.next_id(),
            seal: seal.to_string(),
        };
        self.state.bags.insert(seal.to_string(), bag.clone());
        Ok(bag)
    }

    async fn find_bag_by_seal(&mut self, seal: &str) -> StoreResult<Option<Bag>> {
        Ok(self.state.bags.get(seal).cloned())
    }

    async fn delete_bag(&mut self, bag_id: i64) -> StoreResult<()> {
        let seal = self
            .state
            .bags
            .iter()
            .find(|(_, bag)| bag.id == bag_id)
            .map(|(seal, _)| seal.clone());
        match seal {
            Some(seal) => {
                self.state.bags.remove(&seal);
                Ok(())
            },
            None => Err(StoreError::NotFound(format!("bag {bag_id} not found"))),
        }
    }

    async fn count_by_bag(&mut self, bag_id: i64) -> StoreResult<i64> {
        Ok(self
            .state
            .parcels
            .values()
            .filter(|p| p.bag_id == bag_id)
            .count() as i64)
    }

    async fn find_or_create_district(&mut self, name: &str) -> StoreResult<District> {
        if let Some(district) = self.state.districts.get(name) {
            return Ok(district.clone());
        }
        let district = District {
            id: self.state.next_id(),
            name: name.to_string(),
        };
        self.state
            .districts
            .insert(name.to_string(), district.clone());
        Ok(district)
    }

    async fn find_district_by_name(&mut self, name: &str) -> StoreResult<Option<District>> {
        Ok(self.state.districts.get(name).cloned())
    }

    async fn append_transition(&mut self, transition: NewTransition) -> StoreResult<()> {
        let id = self.state.next_id();
        self.state.transitions.push(TransitionRecord {
            id,
            parcel_id: transition.parcel_id,
            from_state: transition.from_state,
            to_state: transition.to_state,
            changed_at: transition.changed_at,
            motive: transition.motive,
            changed_by: transition.changed_by,
        });
        Ok(())
    }

    async fn transitions_for_parcel(
        &mut self,
        parcel_id: i64,
    ) -> StoreResult<Vec<TransitionRecord>> {
        let mut records: Vec<_> = self
            .state
            .transitions
            .iter()
            .filter(|t| t.parcel_id == parcel_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.changed_at, b.id).cmp(&(a.changed_at, a.id)));
        Ok(records)
    }

    async fn purge_transitions(&mut self, parcel_ids: &[i64]) -> StoreResult<()> {
        self.state
            .transitions
            .retain(|t| !parcel_ids.contains(&t.parcel_id));
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn new_parcel(tracking: &str) -> NewParcel {
        NewParcel {
            tracking_code: tracking.to_string(),
            bag_id: 1,
            district_id: 1,
            received_at: Utc::now(),
            changed_by: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let mut store = MemoryStore::new();
        let parcel = store.insert_parcel(new_parcel("HZCR1")).await.unwrap();
        assert_eq!(parcel.state, ParcelState::INITIAL);
        let found = store.find_by_tracking_code("HZCR1").await.unwrap().unwrap();
        assert_eq!(found.id, parcel.id);
        assert!(store.exists_by_tracking_code("HZCR1").await.unwrap());
        assert!(!store.exists_by_tracking_code("HZCR2").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let mut store = MemoryStore::new();
        store.insert_parcel(new_parcel("HZCR1")).await.unwrap();
        assert!(matches!(
            store.insert_parcel(new_parcel("HZCR1")).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_insert_ignore_reports_inserted() {
        let mut store = MemoryStore::new();
        store.insert_parcel(new_parcel("HZCR1")).await.unwrap();
        let inserted = store
            .batch_insert_ignore(&[new_parcel("HZCR1"), new_parcel("HZCR2")])
            .await
            .unwrap();
        assert_eq!(inserted, vec!["HZCR2".to_string()]);
    }

    #[tokio::test]
    async fn test_rollback_restores_state() {
        let mut store = MemoryStore::new();
        store.insert_parcel(new_parcel("HZCR1")).await.unwrap();
        store.begin().await.unwrap();
        store.insert_parcel(new_parcel("HZCR2")).await.unwrap();
        store.rollback().await.unwrap();
        assert!(store.exists_by_tracking_code("HZCR1").await.unwrap());
        assert!(!store.exists_by_tracking_code("HZCR2").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_begin_rejected() {
        let mut store = MemoryStore::new();
        store.begin().await.unwrap();
        assert!(matches!(
            store.begin().await,
            Err(StoreError::Transaction(_))
        ));
    }

    #[tokio::test]
    async fn test_transitions_ordered_most_recent_first() {
        let mut store = MemoryStore::new();
        let parcel = store.insert_parcel(new_parcel("HZCR1")).await.unwrap();
        let base = Utc::now();
        for offset in [0, 60, 30] {
            store
                .append_transition(NewTransition {
                    parcel_id: parcel.id,
                    from_state: None,
                    to_state: ParcelState::INITIAL,
                    changed_at: base + chrono::Duration::seconds(offset),
                    motive: None,
                    changed_by: "test".to_string(),
                })
                .await
                .unwrap();
        }
        let records = store.transitions_for_parcel(parcel.id).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].changed_at >= records[1].changed_at);
        assert!(records[1].changed_at >= records[2].changed_at);
    }

    #[tokio::test]
    async fn test_bag_lifecycle() {
        let mut store = MemoryStore::new();
        let bag = store.find_or_create_bag("12345").await.unwrap();
        let again = store.find_or_create_bag("12345").await.unwrap();
        assert_eq!(bag.id, again.id);
        assert_eq!(store.count_by_bag(bag.id).await.unwrap(), 0);
        store.delete_bag(bag.id).await.unwrap();
        assert!(store.find_bag_by_seal("12345").await.unwrap().is_none());
    }
}
