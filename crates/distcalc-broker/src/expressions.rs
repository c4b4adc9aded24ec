use distcalc_core::{Expression, ExpressionId, Program};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;

struct TableState {
    expressions: BTreeMap<ExpressionId, Expression>,
    last_id: ExpressionId,
}

/// All submitted expressions, kept after they finish for status polling.
pub struct ExpressionTable {
    state: Mutex<TableState>,
}

/// Exclusive access to the table; holding it serializes reduction passes.
pub struct TableGuard<'a> {
    state: MutexGuard<'a, TableState>,
}

impl ExpressionTable {
    pub fn new() -> Self {
        ExpressionTable {
            state: Mutex::new(TableState {
                expressions: BTreeMap::new(),
                last_id: 0,
            }),
        }
    }

    pub fn lock(&self) -> TableGuard<'_> {
        TableGuard {
            state: self.state.lock(),
        }
    }

    /// Snapshot of one expression
    pub fn get(&self, id: ExpressionId) -> Option<Expression> {
        self.lock().get(id).cloned()
    }

    /// Snapshots in id order, optionally restricted to one owner
    pub fn list(&self, owner_id: Option<u64>) -> Vec<Expression> {
        let guard = self.lock();
        guard
            .state
            .expressions
            .values()
            .filter(|expr| owner_id.map_or(true, |owner| expr.owner_id == owner))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().state.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ExpressionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TableGuard<'_> {
    /// Register a new Processing expression and return its id
    pub fn insert(&mut self, owner_id: u64, raw_text: &str, program: Program) -> ExpressionId {
        self.state.last_id += 1;
        let id = self.state.last_id;
        self.state
            .expressions
            .insert(id, Expression::new(id, owner_id, raw_text, program));
        id
    }

    pub fn get(&self, id: ExpressionId) -> Option<&Expression> {
        self.state.expressions.get(&id)
    }

    pub fn get_mut(&mut self, id: ExpressionId) -> Option<&mut Expression> {
        self.state.expressions.get_mut(&id)
    }
}
