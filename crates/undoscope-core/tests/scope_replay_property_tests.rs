//! Property-based tests for scope replay and stack round trips
//!
//! For any sequence of recorded mutations, replaying the scope restores the
//! state it started from, and undo followed by redo restores the state the
//! mutations produced.

use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use undoscope_core::{ChangeRecord, ScopeContext, ScopeKind, ScopeStackManager};

/// Integer register whose writes record closure inverses
#[derive(Clone)]
struct Register {
    ctx: Arc<ScopeContext>,
    values: Arc<Mutex<Vec<i64>>>,
}

impl Register {
    fn new(ctx: &Arc<ScopeContext>, initial: Vec<i64>) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            values: Arc::new(Mutex::new(initial)),
        }
    }

    fn write(&self, slot: usize, value: i64) {
        let old = {
            let mut values = self.values.lock();
            let slot = slot % values.len();
            std::mem::replace(&mut values[slot], value)
        };
        let this = self.clone();
        self.ctx.record(ChangeRecord::from_fn("restore", move || {
            this.write(slot, old)
        }));
    }

    fn snapshot(&self) -> Vec<i64> {
        self.values.lock().clone()
    }
}

fn writes() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0usize..8, -1000i64..1000), 1..40)
}

proptest! {
    #[test]
    fn prop_replay_restores_initial_state(
        initial in prop::collection::vec(-1000i64..1000, 1..8),
        ops in writes(),
    ) {
        let ctx = ScopeContext::new();
        let register = Register::new(&ctx, initial.clone());

        let entry = ctx.enter_or_join("Edit");
        for (slot, value) in &ops {
            register.write(*slot, *value);
        }
        prop_assert_eq!(entry.scope.record_count(), ops.len());

        prop_assert!(entry.scope.replay_blocking("Edit"));
        prop_assert_eq!(register.snapshot(), initial);
    }

    #[test]
    fn prop_undo_then_redo_restores_final_state(
        initial in prop::collection::vec(-1000i64..1000, 1..8),
        ops in writes(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let ctx = ScopeContext::new();
        let manager = ScopeStackManager::new(Arc::clone(&ctx)).unwrap();
        let register = Register::new(&ctx, initial.clone());

        let guard = ctx.begin("Edit");
        for (slot, value) in &ops {
            register.write(*slot, *value);
        }
        manager.commit(guard.finish().unwrap(), ScopeKind::Do);
        let after = register.snapshot();

        runtime.block_on(manager.undo(None)).unwrap();
        prop_assert_eq!(register.snapshot(), initial);

        runtime.block_on(manager.redo(None)).unwrap();
        prop_assert_eq!(register.snapshot(), after);
    }
}
