use std::collections::HashSet;
use std::sync::Arc;

use asha_field_core::{MemoryStore, ModuleKey, Payload, RecordStore, SyncStatus};
use proptest::prelude::*;
use serde_json::json;

#[derive(Debug, Clone)]
enum Op {
    Create,
    /// Removes the survivor at this index (modulo the survivor count).
    Remove(usize),
    /// Removes an id that was never issued.
    RemoveUnknown,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        2 => any::<usize>().prop_map(Op::Remove),
        1 => Just(Op::RemoveUnknown),
    ]
}

fn referral() -> Payload {
    json!({
        "patientName": "Ramesh",
        "reason": "High fever",
        "referredTo": "PHC Rampur",
        "village": "Rampur"
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn status() -> impl Strategy<Value = SyncStatus> {
    prop_oneof![
        Just(SyncStatus::Pending),
        Just(SyncStatus::Syncing),
        Just(SyncStatus::Synced),
        Just(SyncStatus::Failed),
    ]
}

proptest! {
    #[test]
    fn prop_client_ids_unique_across_create_and_remove(ops in prop::collection::vec(op(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let store = RecordStore::new(Arc::new(MemoryStore::new()));
            let module = ModuleKey::Referrals;
            let mut issued = HashSet::new();
            let mut survivors: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Create => {
                        let record = store.create(module, referral(), "ASHA-1").await.unwrap();
                        assert!(
                            issued.insert(record.client_id.clone()),
                            "{} issued twice",
                            record.client_id
                        );
                        survivors.push(record.client_id);
                    }
                    Op::Remove(i) if !survivors.is_empty() => {
                        let id = survivors.remove(i % survivors.len());
                        assert!(store.remove(module, &id).await.unwrap());
                    }
                    Op::Remove(_) => {}
                    Op::RemoveUnknown => {
                        assert!(!store.remove(module, "R99999").await.unwrap());
                    }
                }

                let listed: Vec<String> = store
                    .list(module)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| r.client_id)
                    .collect();
                assert_eq!(listed, survivors);
            }
        });
    }

    #[test]
    fn prop_only_table_transitions_are_allowed(from in status(), to in status()) {
        let allowed = matches!(
            (from, to),
            (SyncStatus::Pending, SyncStatus::Syncing)
                | (SyncStatus::Syncing, SyncStatus::Synced)
                | (SyncStatus::Syncing, SyncStatus::Pending)
                | (SyncStatus::Syncing, SyncStatus::Failed)
                | (SyncStatus::Failed, SyncStatus::Pending)
        );
        prop_assert_eq!(from.can_transition_to(to), allowed);
    }
}
