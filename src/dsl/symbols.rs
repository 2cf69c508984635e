//! Scoped symbol table with typed value slots.

use std::collections::HashMap;

use super::types::MusicType;
use super::value::{LiteralKind, Payload};

/// Index of a value slot. Slots outlive the scope that declared them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

/// Mutable storage a variable resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub ty: MusicType,
    pub literal: Option<LiteralKind>,
    pub payload: Payload,
    /// Declared name; temporaries have none.
    pub name: Option<String>,
}

/// How "real" a declared variable is. Only ever raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefState {
    Undefined = 1,
    Tentative = 2,
    Defined = 3,
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<HashMap<String, SlotId>>,
    slots: Vec<Slot>,
    def_state: HashMap<SlotId, DefState>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table with the file scope open.
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            slots: Vec::new(),
            def_state: HashMap::new(),
        }
    }

    pub fn new_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Drop the innermost scope's names. The file scope is never closed.
    pub fn end_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Resolve `name` to a variable slot, innermost scope first.
    pub fn lookup(&self, name: &str) -> Result<SlotId, String> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .ok_or_else(|| format!("use of undeclared identifier '{name}'"))
    }

    /// Declare `name` in the current scope, reusing its slot when it is
    /// already declared there. The definition state only ever goes up.
    pub fn add_variable(&mut self, name: &str, ty: MusicType, state: DefState) -> SlotId {
        let existing = self.scopes.last().and_then(|scope| scope.get(name)).copied();
        let slot = match existing {
            Some(slot) => {
                self.slots[slot.0].ty = ty;
                slot
            }
            None => {
                let slot = self.alloc(ty, Some(name.to_string()));
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(name.to_string(), slot);
                }
                slot
            }
        };
        let entry = self.def_state.entry(slot).or_insert(state);
        *entry = (*entry).max(state);
        slot
    }

    pub fn def_state(&self, slot: SlotId) -> Option<DefState> {
        self.def_state.get(&slot).copied()
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id.0]
    }

    pub fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        &mut self.slots[id.0]
    }

    /// An anonymous slot, e.g. for a string literal used as a place.
    pub fn alloc_temp(&mut self, ty: MusicType) -> SlotId {
        self.alloc(ty, None)
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn alloc(&mut self, ty: MusicType, name: Option<String>) -> SlotId {
        self.slots.push(Slot {
            ty,
            literal: None,
            payload: Payload::Unset,
            name,
        });
        SlotId(self.slots.len() - 1)
    }
}
