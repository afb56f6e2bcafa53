//! Bookmarks - nested speculative execution
//!
//! A bookmark is a full copy of the ledger taken at one point in time.
//! Bookmarks form a strict stack: only the most recent, unresolved bookmark
//! may be rolled back to or deleted.
//!
//! # Critical Invariants
//!
//! - **LIFO**: resolving any bookmark other than the top of the stack is an
//!   error, at every nesting depth.
//! - **No aliasing**: every bookmark owns its own copy of the ledger.
//! - **Exactly-once resolution**: the scoped helpers (`transaction`,
//!   `temporary_transaction`, `BookmarkGuard`) resolve the bookmark they took
//!   on every exit path.

use crate::models::ledger::Ledger;
use crate::simulator::{FactorySimulator, SimulatorError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{error, trace};

/// Opaque bookmark identifier, never reused within one simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookmarkId(u64);

impl BookmarkId {
    /// Raw id, for callers across the FFI boundary
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[cfg(feature = "pyo3")]
    pub(crate) fn from_u64(raw: u64) -> Self {
        BookmarkId(raw)
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Bookmark {
    id: BookmarkId,
    ledger: Ledger,
}

/// Stack of ledger snapshots
#[derive(Debug, Clone, Default)]
pub(crate) struct BookmarkStack {
    next_id: u64,
    bookmarks: Vec<Bookmark>,
}

impl BookmarkStack {
    /// Push a snapshot and return its id
    pub(crate) fn push(&mut self, ledger: Ledger) -> BookmarkId {
        let id = BookmarkId(self.next_id);
        self.next_id += 1;
        self.bookmarks.push(Bookmark { id, ledger });
        trace!(bookmark = %id, depth = self.bookmarks.len(), "bookmark taken");
        id
    }

    /// Id of the bookmark on top of the stack
    pub(crate) fn active(&self) -> Option<BookmarkId> {
        self.bookmarks.last().map(|b| b.id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.bookmarks.len()
    }

    /// Snapshot held by `id`, which must be the active bookmark
    pub(crate) fn snapshot(&self, id: BookmarkId) -> Result<&Ledger, SimulatorError> {
        match self.bookmarks.last() {
            Some(top) if top.id == id => Ok(&top.ledger),
            _ => Err(self.not_active(id)),
        }
    }

    /// Pop `id`, which must be the active bookmark
    pub(crate) fn pop(&mut self, id: BookmarkId) -> Result<(), SimulatorError> {
        if self.active() != Some(id) {
            return Err(self.not_active(id));
        }
        self.bookmarks.pop();
        trace!(bookmark = %id, depth = self.bookmarks.len(), "bookmark released");
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.bookmarks.clear();
    }

    fn not_active(&self, requested: BookmarkId) -> SimulatorError {
        SimulatorError::BookmarkNotActive {
            requested,
            active: self.active(),
        }
    }
}

/// Run `work` inside a bookmark and keep its changes
///
/// The bookmark is deleted when `work` returns `Ok`. When `work` returns
/// `Err`, the ledger is rolled back to the bookmark before it is deleted and
/// the error is passed through. `work` may itself call `rollback(id)` to
/// discard its changes and still return `Ok`.
///
/// # Example
/// ```
/// use factory_simulator_core_rs::{
///     transaction, FactoryProfile, FactorySimulator, Simulator, SimulatorConfig, SimulatorError,
/// };
///
/// let profile = FactoryProfile::uniform(2, 1, 10, 1);
/// let mut sim = Simulator::new(profile, SimulatorConfig::with_balance(100)).unwrap();
///
/// transaction(&mut sim, |sim, _| -> Result<(), SimulatorError> {
///     sim.pay(30, 2, true)?;
///     Ok(())
/// })
/// .unwrap();
/// assert_eq!(sim.final_balance(), 70);
/// ```
pub fn transaction<S, T, E, F>(simulator: &mut S, work: F) -> Result<T, E>
where
    S: FactorySimulator + ?Sized,
    E: From<SimulatorError>,
    F: FnOnce(&mut S, BookmarkId) -> Result<T, E>,
{
    let id = simulator.bookmark();
    match work(&mut *simulator, id) {
        Ok(value) => {
            simulator.delete_bookmark(id)?;
            Ok(value)
        }
        Err(err) => {
            discard(simulator, id);
            Err(err)
        }
    }
}

/// Run `work` inside a bookmark and always discard its changes
///
/// Used for read-only "what if" exploration: whatever `work` returns, the
/// ledger afterwards equals the ledger before the call.
///
/// # Example
/// ```
/// use factory_simulator_core_rs::{
///     temporary_transaction, FactoryProfile, FactorySimulator, Simulator, SimulatorConfig,
///     SimulatorError,
/// };
///
/// let profile = FactoryProfile::uniform(2, 1, 10, 1);
/// let mut sim = Simulator::new(profile, SimulatorConfig::with_balance(100)).unwrap();
///
/// let would_be = temporary_transaction(&mut sim, |sim, _| -> Result<i64, SimulatorError> {
///     sim.pay(30, 2, true)?;
///     Ok(sim.final_balance())
/// })
/// .unwrap();
/// assert_eq!(would_be, 70);
/// assert_eq!(sim.final_balance(), 100);
/// ```
pub fn temporary_transaction<S, T, E, F>(simulator: &mut S, work: F) -> Result<T, E>
where
    S: FactorySimulator + ?Sized,
    E: From<SimulatorError>,
    F: FnOnce(&mut S, BookmarkId) -> Result<T, E>,
{
    let id = simulator.bookmark();
    let outcome = work(&mut *simulator, id);
    match outcome {
        Ok(value) => {
            simulator.rollback(id)?;
            simulator.delete_bookmark(id)?;
            Ok(value)
        }
        Err(err) => {
            discard(simulator, id);
            Err(err)
        }
    }
}

/// Roll back and delete `id` on an error path, where the caller's error wins
fn discard<S: FactorySimulator + ?Sized>(simulator: &mut S, id: BookmarkId) {
    let resolved = simulator
        .rollback(id)
        .and_then(|()| simulator.delete_bookmark(id));
    if let Err(e) = resolved {
        error!(bookmark = %id, error = %e, "failed to discard bookmark");
    }
}

/// What a guard does with its bookmark when dropped unresolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnDrop {
    Commit,
    Discard,
}

/// RAII bookmark scope
///
/// Dereferences to the simulator it guards. Unless resolved explicitly with
/// [`commit`](Self::commit) or [`discard`](Self::discard), the bookmark is
/// resolved on drop: a commit guard keeps the changes, a discard guard rolls
/// them back. While unwinding from a panic both kinds roll back.
///
/// # Example
/// ```
/// use factory_simulator_core_rs::{
///     BookmarkGuard, FactoryProfile, FactorySimulator, Simulator, SimulatorConfig,
/// };
///
/// let profile = FactoryProfile::uniform(2, 1, 10, 1);
/// let mut sim = Simulator::new(profile, SimulatorConfig::with_balance(100)).unwrap();
/// {
///     let mut what_if = BookmarkGuard::discard_on_drop(&mut sim);
///     what_if.pay(500, 0, true).unwrap();
///     assert!(what_if.is_bankrupt());
/// }
/// assert!(!sim.is_bankrupt());
/// ```
pub struct BookmarkGuard<'a, S: FactorySimulator + ?Sized> {
    simulator: &'a mut S,
    id: BookmarkId,
    on_drop: OnDrop,
    resolved: bool,
}

impl<'a, S: FactorySimulator + ?Sized> BookmarkGuard<'a, S> {
    /// Take a bookmark that keeps its changes unless discarded
    pub fn commit_on_drop(simulator: &'a mut S) -> Self {
        Self::open(simulator, OnDrop::Commit)
    }

    /// Take a bookmark that discards its changes unless committed
    pub fn discard_on_drop(simulator: &'a mut S) -> Self {
        Self::open(simulator, OnDrop::Discard)
    }

    fn open(simulator: &'a mut S, on_drop: OnDrop) -> Self {
        let id = simulator.bookmark();
        Self {
            simulator,
            id,
            on_drop,
            resolved: false,
        }
    }

    pub fn id(&self) -> BookmarkId {
        self.id
    }

    /// Keep every change made since the bookmark
    pub fn commit(mut self) -> Result<(), SimulatorError> {
        self.resolved = true;
        self.simulator.delete_bookmark(self.id)
    }

    /// Drop every change made since the bookmark
    pub fn discard(mut self) -> Result<(), SimulatorError> {
        self.resolved = true;
        self.simulator.rollback(self.id)?;
        self.simulator.delete_bookmark(self.id)
    }
}

impl<S: FactorySimulator + ?Sized> Deref for BookmarkGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &*self.simulator
    }
}

impl<S: FactorySimulator + ?Sized> DerefMut for BookmarkGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut *self.simulator
    }
}

impl<S: FactorySimulator + ?Sized> Drop for BookmarkGuard<'_, S> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        if self.on_drop == OnDrop::Commit && !std::thread::panicking() {
            if let Err(e) = self.simulator.delete_bookmark(self.id) {
                error!(bookmark = %self.id, error = %e, "failed to commit bookmark");
            }
        } else {
            discard(&mut *self.simulator, self.id);
        }
    }
}
