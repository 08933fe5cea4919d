//! Namespaced contract storage.
//!
//! Every contract that writes state owns one or more *regions*, each bound to
//! a unique [`StorageId`]. A region is an ordinary Rust struct; the arena
//! keeps at most one instance per id, so two features running in the same
//! proxy context can never alias each other's state.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

// ─── StorageId ────────────────────────────────────────────────────────────────

/// Fixed storage namespace identifiers.
///
/// Proxy-context ids come first and must never be renumbered: a deployed
/// proxy keeps its data under these slots forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StorageId {
    Proxy = 0,
    SimpleFunctionRegistry = 1,
    Ownable = 2,
    TokenSpender = 3,
    TransformERC20 = 4,
    MetaTransactions = 5,
    ReentrancyGuard = 6,
    PuppetPool = 7,
    Bootstrap = 8,

    // Standalone contracts (their own storage context).
    Puppet = 32,
    Authorizable = 33,
    TransformerDeployer = 34,
    Transformer = 35,
    Migration = 36,
    Erc20Token = 37,
    Exchange = 38,
    TestContract = 63,
}

impl StorageId {
    /// Base slot of the namespace: `(id + 1) << 128`.
    pub fn slot(self) -> U256 {
        U256::from(self as u8 as u64 + 1) << 128usize
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@0x{:x}", self, self.slot())
    }
}

// ─── StorageRegion ────────────────────────────────────────────────────────────

/// A typed block of state living under one [`StorageId`].
pub trait StorageRegion: Any + Clone + Default + fmt::Debug + Send + Sync {
    const ID: StorageId;
}

trait ErasedRegion: Any + fmt::Debug + Send + Sync {
    fn clone_region(&self) -> Box<dyn ErasedRegion>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<R: StorageRegion> ErasedRegion for R {
    fn clone_region(&self) -> Box<dyn ErasedRegion> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn ErasedRegion> {
    fn clone(&self) -> Self {
        self.clone_region()
    }
}

// ─── StorageArena ─────────────────────────────────────────────────────────────

/// All storage regions of one account.
#[derive(Debug, Clone, Default)]
pub struct StorageArena {
    regions: BTreeMap<StorageId, Box<dyn ErasedRegion>>,
}

impl StorageArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow region `R`, if it was ever written.
    ///
    /// # Panics
    /// If a different region type already occupies `R::ID`.
    pub fn get<R: StorageRegion>(&self) -> Option<&R> {
        self.regions.get(&R::ID).map(|region| {
            region
                .as_any()
                .downcast_ref::<R>()
                .unwrap_or_else(|| panic!("storage collision at {}", R::ID))
        })
    }

    /// Mutably borrow region `R`, zero-initialising it on first use.
    ///
    /// # Panics
    /// If a different region type already occupies `R::ID`.
    pub fn get_mut<R: StorageRegion>(&mut self) -> &mut R {
        self.regions
            .entry(R::ID)
            .or_insert_with(|| Box::new(R::default()) as Box<dyn ErasedRegion>)
            .as_any_mut()
            .downcast_mut::<R>()
            .unwrap_or_else(|| panic!("storage collision at {}", R::ID))
    }

    /// Run `read` against region `R`, or against its zero value if unset.
    pub fn view<R: StorageRegion, T>(&self, read: impl FnOnce(&R) -> T) -> T {
        match self.get::<R>() {
            Some(region) => read(region),
            None => read(&R::default()),
        }
    }

    /// Ids of every region that has been touched.
    pub fn ids(&self) -> impl Iterator<Item = StorageId> + '_ {
        self.regions.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
