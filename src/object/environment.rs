use crate::object::Object;
use indexmap::IndexMap;
use std::mem;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Live scope count below which [`Environment::pop_frame`] never sweeps.
const MIN_SWEEP_THRESHOLD: usize = 64;

/// Handle to one scope of an [`Environment`].
///
/// Only meaningful for the environment that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

/// Shared ownership of a scope, held by the function values that closed over
/// it. A scope with a live `ScopeRef` is never reclaimed, and neither is any
/// scope enclosing it.
#[derive(Clone, Debug)]
pub struct ScopeRef(Rc<ScopeId>);

impl ScopeRef {
    pub fn id(&self) -> ScopeId {
        *self.0
    }
}

impl PartialEq for ScopeRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

#[derive(Debug)]
struct Scope {
    store: IndexMap<String, Object>,
    /// Keeps the enclosing scope alive for as long as this one is.
    outer: Option<ScopeRef>,
    refs: Weak<ScopeId>,
    /// A call frame still being evaluated, or the root.
    active: bool,
}

/// All the scopes of one interpreter session, kept in an arena.
///
/// A call frame is freed as soon as its call returns unless a closure captured
/// it. Captured scopes are reference counted through [`ScopeRef`] and come
/// back when the last closure holding them is dropped. Closures reachable only
/// from their own scope form cycles that reference counting cannot see; a
/// sweep from the live roots picks those up.
#[derive(Debug)]
pub struct Environment {
    scopes: Vec<Option<Scope>>,
    free: Vec<usize>,
    live: usize,
    sweep_at: usize,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            scopes: vec![Some(Scope {
                store: IndexMap::new(),
                outer: None,
                refs: Weak::new(),
                active: true,
            })],
            free: vec![],
            live: 1,
            sweep_at: MIN_SWEEP_THRESHOLD,
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Default::default()
    }

    /// The outermost scope, holding top-level `let` bindings.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn set(&mut self, scope: ScopeId, key: &str, value: Object) {
        match self.slot_mut(scope) {
            Some(s) => {
                s.store.insert(key.to_string(), value);
            }
            None => trace!(?scope, key, "set on a released scope ignored"),
        }
    }

    /// Looks `key` up in `scope`, then in each enclosing scope in turn.
    pub fn get(&self, scope: ScopeId, key: &str) -> Option<Object> {
        let mut current = Some(scope);

        while let Some(id) = current {
            let scope = self.slot(id)?;

            if let Some(value) = scope.store.get(key) {
                return Some(value.clone());
            }

            current = scope.outer.as_ref().map(ScopeRef::id);
        }

        None
    }

    /// Takes shared ownership of `scope` for a function literal evaluated in it.
    pub fn capture(&mut self, scope: ScopeId) -> ScopeRef {
        let slot = match self.slot_mut(scope) {
            Some(slot) => slot,
            None => return ScopeRef(Rc::new(scope)),
        };

        match slot.refs.upgrade() {
            Some(rc) => ScopeRef(rc),
            None => {
                let rc = Rc::new(scope);
                slot.refs = Rc::downgrade(&rc);
                ScopeRef(rc)
            }
        }
    }

    /// Opens a call frame enclosed by the scope a function closed over.
    pub fn push_frame(&mut self, outer: &ScopeRef) -> ScopeId {
        let scope = Scope {
            store: IndexMap::new(),
            outer: Some(outer.clone()),
            refs: Weak::new(),
            active: true,
        };
        self.live += 1;

        match self.free.pop() {
            Some(idx) => {
                self.scopes[idx] = Some(scope);
                ScopeId(idx)
            }
            None => {
                self.scopes.push(Some(scope));
                ScopeId(self.scopes.len() - 1)
            }
        }
    }

    /// Closes a frame opened by [`push_frame`](Self::push_frame). The frame,
    /// and any enclosing scope it alone kept alive, is freed unless captured.
    pub fn pop_frame(&mut self, frame: ScopeId) {
        if let Some(slot) = self.slot_mut(frame) {
            slot.active = false;
        }

        let mut current = Some(frame);
        while let Some(id) = current {
            let unused = matches!(
                self.slot(id),
                Some(slot) if !slot.active && slot.refs.strong_count() == 0
            );
            if !unused {
                break;
            }

            // Dropping the freed scope releases its hold on the enclosing one.
            current = self
                .take(id)
                .and_then(|scope| scope.outer.as_ref().map(ScopeRef::id));
        }

        if self.live > self.sweep_at {
            self.sweep();
            self.sweep_at = (self.live * 2).max(MIN_SWEEP_THRESHOLD);
        }
    }

    /// Frees every scope that can no longer be reached.
    ///
    /// Roots are the root scope, frames still being evaluated and scopes held
    /// by function values outside the environment. Everything reachable from a
    /// root through bindings and enclosing scopes is kept.
    pub fn sweep(&mut self) {
        let before = self.live;

        // References to each scope made from inside the arena. A scope whose
        // handle is held more often than that is also held from outside.
        let mut internal = vec![0usize; self.scopes.len()];
        for scope in self.scopes.iter().flatten() {
            if let Some(outer) = &scope.outer {
                internal[outer.id().0] += 1;
            }
            for value in scope.store.values() {
                if let Object::Function(closure) = value {
                    internal[closure.scope.id().0] += 1;
                }
            }
        }

        let mut marked = vec![false; self.scopes.len()];
        let mut pending: Vec<usize> = self
            .scopes
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let scope = slot.as_ref()?;
                let held = scope.active || scope.refs.strong_count() > internal[idx];
                held.then_some(idx)
            })
            .collect();

        while let Some(idx) = pending.pop() {
            if mem::replace(&mut marked[idx], true) {
                continue;
            }
            if let Some(scope) = &self.scopes[idx] {
                if let Some(outer) = &scope.outer {
                    pending.push(outer.id().0);
                }
                for value in scope.store.values() {
                    trace_scopes(value, &mut pending);
                }
            }
        }

        // Dropping a scope can drop the last handle to another, so the freed
        // scopes are only released once every slot has been emptied.
        let garbage: Vec<Scope> = marked
            .into_iter()
            .enumerate()
            .filter(|(_, is_marked)| !is_marked)
            .filter_map(|(idx, _)| self.take(ScopeId(idx)))
            .collect();
        drop(garbage);

        debug!(before, after = self.live, "swept environment");
    }

    /// Number of live scopes, the root included.
    pub fn scope_count(&self) -> usize {
        self.live
    }

    fn slot(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn take(&mut self, id: ScopeId) -> Option<Scope> {
        let scope = self.scopes.get_mut(id.0)?.take()?;
        self.live -= 1;
        self.free.push(id.0);
        Some(scope)
    }
}

fn trace_scopes(value: &Object, pending: &mut Vec<usize>) {
    match value {
        Object::Function(closure) => pending.push(closure.scope.id().0),
        Object::Array(elements) => elements.iter().for_each(|e| trace_scopes(e, pending)),
        Object::Return(value) => trace_scopes(value, pending),
        _ => {}
    }
}
