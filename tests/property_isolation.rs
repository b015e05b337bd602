//! Property tests for snapshot installation.
//!
//! Verifies that installing and closing snapshots always puts every key back
//! exactly as it was, whatever the prior values, and that interleaved
//! bridges never see each other's values after a close.

mod common;

use carryover::{
    CallSite, Carrier, ContextRegistry, ContextSnapshot, SlotAccessor, SuspensionBridge,
    ThreadLocalAccessor,
};
use common::{init_test_logging, text};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_REGISTRY: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// Per-key state: `None` is absent.
fn arb_state(keys: usize) -> impl Strategy<Value = Vec<Option<u8>>> {
    prop::collection::vec(prop::option::of(any::<u8>()), keys)
}

/// A registry whose key names no other case shares.
fn fresh_registry(keys: usize) -> (Arc<ContextRegistry>, Vec<SlotAccessor>) {
    let id = NEXT_REGISTRY.fetch_add(1, Ordering::Relaxed);
    let registry = ContextRegistry::new();
    let slots = (0..keys)
        .map(|i| registry.register_slot(format!("prop_{id}_{i}")))
        .collect();
    (registry, slots)
}

fn write_state(slots: &[SlotAccessor], state: &[Option<u8>]) {
    for (slot, value) in slots.iter().zip(state) {
        match value {
            Some(v) => slot.set(*v).unwrap(),
            None => slot.reset().unwrap(),
        }
    }
}

fn read_state(slots: &[SlotAccessor]) -> Vec<Option<u8>> {
    slots.iter().map(|slot| slot.get::<u8>()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// install then close restores the exact pre-install state.
    #[test]
    fn install_close_restores_prior_state(
        (captured, prior) in (1usize..6).prop_flat_map(|n| (arb_state(n), arb_state(n)))
    ) {
        init_test_logging();
        let (registry, slots) = fresh_registry(captured.len());

        write_state(&slots, &captured);
        let snapshot = ContextSnapshot::capture(&registry);
        write_state(&slots, &prior);

        let scope = snapshot.install().unwrap();
        prop_assert_eq!(read_state(&slots), captured);
        scope.close().unwrap();
        prop_assert_eq!(read_state(&slots), prior);
    }

    /// Writes made while installed never survive the close.
    #[test]
    fn close_discards_writes_made_in_window(
        (captured, prior, scribble) in (1usize..6)
            .prop_flat_map(|n| (arb_state(n), arb_state(n), arb_state(n)))
    ) {
        init_test_logging();
        let (registry, slots) = fresh_registry(captured.len());

        write_state(&slots, &captured);
        let snapshot = ContextSnapshot::capture(&registry);
        write_state(&slots, &prior);

        let scope = snapshot.install().unwrap();
        write_state(&slots, &scribble);
        scope.close().unwrap();
        prop_assert_eq!(read_state(&slots), prior);
    }

    /// Two bridges resumed in alternation on one thread each see only
    /// their own snapshot, and the thread's own state survives.
    #[test]
    fn interleaved_bridges_are_isolated(
        (first, second, ambient) in (1usize..5)
            .prop_flat_map(|n| (arb_state(n), arb_state(n), arb_state(n))),
        rounds in 1usize..4,
    ) {
        init_test_logging();
        let (registry, slots) = fresh_registry(first.len());

        write_state(&slots, &first);
        let a = SuspensionBridge::new(&registry, None);
        write_state(&slots, &second);
        let b = SuspensionBridge::new(&registry, None);
        write_state(&slots, &ambient);

        for round in 0..rounds {
            let call_site = CallSite::labeled("a").with_poll(round as u64);
            let scope = a.on_resume(&call_site).unwrap();
            prop_assert_eq!(read_state(&slots), first.clone());
            a.on_suspend(&call_site, scope).unwrap();
            prop_assert_eq!(read_state(&slots), ambient.clone());

            let call_site = CallSite::labeled("b").with_poll(round as u64);
            let scope = b.on_resume(&call_site).unwrap();
            prop_assert_eq!(read_state(&slots), second.clone());
            b.on_suspend(&call_site, scope).unwrap();
            prop_assert_eq!(read_state(&slots), ambient.clone());
        }
    }

    /// A non-empty carrier decides every key it names.
    #[test]
    fn carrier_values_win(thread in any::<u8>(), carried in "[a-z]{1,8}") {
        init_test_logging();
        let (registry, slots) = fresh_registry(1);
        slots[0].set(thread).unwrap();

        let key = slots[0].key().clone();
        let carrier = Carrier::of(key.clone(), text(&carried));
        let snapshot = ContextSnapshot::capture_from(&registry, Some(&carrier));

        let captured = snapshot.get(&key).flatten().and_then(|v| v.get::<String>());
        prop_assert_eq!(captured, Some(carried));
    }
}
