//! The execution host.
//!
//! `Evm` owns every account (balance, nonce, code, storage) plus the block /
//! transaction environment and the event log. Frames are strictly nested;
//! each one takes a checkpoint on entry and restores it when the contract
//! returns `Err`, so a revert undoes storage, balances, deployments and logs
//! of that frame and everything beneath it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, LogData, U256};
use alloy_sol_types::{SolCall, SolEvent};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::artifacts::ArtifactRegistry;
use crate::config::SimulatorConfig;
use crate::contract::{CallKind, Contract, Frame};
use crate::revert::Revert;
use crate::storage::{StorageArena, StorageRegion};

/// Maximum nesting of frames.
pub const MAX_CALL_DEPTH: usize = 1024;

// ─── Environment ──────────────────────────────────────────────────────────────

/// Block-level environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnv {
    pub number: u64,
    pub timestamp: u64,
    pub chain_id: u64,
}

impl Default for BlockEnv {
    fn default() -> Self {
        Self { number: 1, timestamp: 1_600_000_000, chain_id: 1 }
    }
}

/// Transaction-level environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxEnv {
    /// `tx.origin`.
    pub origin: Address,
    /// `tx.gasprice`.
    pub gas_price: U256,
}

// ─── Accounts & logs ──────────────────────────────────────────────────────────

/// One account.
#[derive(Clone, Default)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Option<Arc<dyn Contract>>,
    pub storage: StorageArena,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("balance", &self.balance)
            .field("nonce", &self.nonce)
            .field("code", &self.code.as_ref().map(|c| c.name()))
            .field("storage", &self.storage)
            .finish()
    }
}

/// An emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub data: LogData,
}

struct Checkpoint {
    accounts: HashMap<Address, Account>,
    logs: usize,
}

// ─── Evm ──────────────────────────────────────────────────────────────────────

/// The deterministic host.
#[derive(Debug, Default)]
pub struct Evm {
    accounts: HashMap<Address, Account>,
    logs: Vec<Log>,
    block: BlockEnv,
    tx: TxEnv,
    artifacts: ArtifactRegistry,
    depth: usize,
    is_static: bool,
}

impl Evm {
    pub fn new(block: BlockEnv) -> Self {
        Self { block, ..Self::default() }
    }

    /// Build a host from a simulator configuration.
    pub fn from_config(config: &SimulatorConfig) -> Self {
        let mut evm = Self::new(BlockEnv {
            number: config.block_number,
            timestamp: config.timestamp,
            chain_id: config.chain_id,
        });
        evm.tx.gas_price = U256::from(config.gas_price);
        evm
    }

    // ── environment ─────────────────────────────────────────────────────────

    pub fn block(&self) -> &BlockEnv {
        &self.block
    }

    pub fn tx(&self) -> &TxEnv {
        &self.tx
    }

    pub fn chain_id(&self) -> u64 {
        self.block.chain_id
    }

    pub fn set_gas_price(&mut self, gas_price: U256) {
        self.tx.gas_price = gas_price;
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.block.timestamp = timestamp;
    }

    /// Move to a later block.
    pub fn advance_block(&mut self, blocks: u64, seconds: u64) {
        self.block.number += blocks;
        self.block.timestamp += seconds;
    }

    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    pub fn artifacts_mut(&mut self) -> &mut ArtifactRegistry {
        &mut self.artifacts
    }

    /// Current frame depth (0 outside any call).
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ── accounts ────────────────────────────────────────────────────────────

    pub fn account(&self, address: Address) -> Option<&Account> {
        self.accounts.get(&address)
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.accounts.get(&address).map(|a| a.balance).unwrap_or_default()
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.accounts.get(&address).map(|a| a.nonce).unwrap_or_default()
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.code(address).is_some()
    }

    pub fn code(&self, address: Address) -> Option<Arc<dyn Contract>> {
        self.accounts.get(&address).and_then(|a| a.code.clone())
    }

    /// Credit `amount` wei out of thin air (genesis funding / test faucet).
    pub fn fund(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    /// Read region `R` of `address`.
    pub fn storage<R: StorageRegion, T>(&self, address: Address, read: impl FnOnce(&R) -> T) -> T {
        match self.accounts.get(&address) {
            Some(account) => account.storage.view(read),
            None => read(&R::default()),
        }
    }

    /// Mutate region `R` of `address`. Fails inside a static frame.
    pub fn storage_mut<R: StorageRegion, T>(
        &mut self,
        address: Address,
        write: impl FnOnce(&mut R) -> T,
    ) -> Result<T, Revert> {
        self.ensure_writable()?;
        let region = self.accounts.entry(address).or_default().storage.get_mut::<R>();
        Ok(write(region))
    }

    // ── logs ────────────────────────────────────────────────────────────────

    /// Emit `event` from `address`.
    pub fn emit<E: SolEvent>(&mut self, address: Address, event: &E) -> Result<(), Revert> {
        self.ensure_writable()?;
        trace!(%address, event = E::SIGNATURE, "log");
        self.logs.push(Log { address, data: event.encode_log_data() });
        Ok(())
    }

    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    /// Every log of type `E`, decoded, in emission order.
    pub fn events<E: SolEvent>(&self) -> Vec<(Address, E)> {
        self.logs
            .iter()
            .filter(|log| log.data.topics().first() == Some(&E::SIGNATURE_HASH))
            .filter_map(|log| {
                E::decode_log_data(&log.data, false).ok().map(|e| (log.address, e))
            })
            .collect()
    }

    pub fn clear_logs(&mut self) {
        self.logs.clear();
    }

    // ── transactions ────────────────────────────────────────────────────────

    /// Top-level message call from an externally owned account.
    pub fn transact(
        &mut self,
        origin: Address,
        to: Address,
        value: U256,
        input: impl Into<Bytes>,
    ) -> Result<Bytes, Revert> {
        self.tx.origin = origin;
        self.accounts.entry(origin).or_default().nonce += 1;
        let result = self.call(origin, to, value, input);
        if let Err(revert) = &result {
            debug!(%origin, %to, %revert, "transaction reverted");
        }
        result
    }

    /// Top-level typed call; decodes the return values.
    pub fn transact_sol<C: SolCall>(
        &mut self,
        origin: Address,
        to: Address,
        value: U256,
        call: &C,
    ) -> Result<C::Return, Revert> {
        self.tx.origin = origin;
        self.accounts.entry(origin).or_default().nonce += 1;
        self.call_sol(origin, to, value, call)
    }

    /// Deploy `code` from an externally owned account.
    pub fn deploy(
        &mut self,
        origin: Address,
        code: Arc<dyn Contract>,
        value: U256,
    ) -> Result<Address, Revert> {
        self.tx.origin = origin;
        self.create(origin, code, value)
    }

    // ── frames ──────────────────────────────────────────────────────────────

    /// `CALL`: run `target`'s code in its own context, moving `value` first.
    /// Calls to accounts without code succeed and return nothing.
    pub fn call(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        input: impl Into<Bytes>,
    ) -> Result<Bytes, Revert> {
        let frame = Frame {
            kind: CallKind::Call,
            address: target,
            code_address: target,
            caller,
            value,
            input: input.into(),
            is_static: false,
        };
        self.enter(frame, None)
    }

    /// `STATICCALL`: like `call` with no value, rejecting any state change.
    pub fn static_call(
        &mut self,
        caller: Address,
        target: Address,
        input: impl Into<Bytes>,
    ) -> Result<Bytes, Revert> {
        let frame = Frame {
            kind: CallKind::StaticCall,
            address: target,
            code_address: target,
            caller,
            value: U256::ZERO,
            input: input.into(),
            is_static: true,
        };
        self.enter(frame, None)
    }

    /// `DELEGATECALL`: run `code_address`'s code in the context of `parent`,
    /// keeping its `msg.sender` and `msg.value`.
    pub fn delegate_call(
        &mut self,
        parent: &Frame,
        code_address: Address,
        input: impl Into<Bytes>,
    ) -> Result<Bytes, Revert> {
        let frame = Frame {
            kind: CallKind::DelegateCall,
            address: parent.address,
            code_address,
            caller: parent.caller,
            value: parent.value,
            input: input.into(),
            is_static: parent.is_static,
        };
        self.enter(frame, None)
    }

    /// Typed `CALL`. Reverts without data if `target` has no code or the
    /// return data does not decode.
    pub fn call_sol<C: SolCall>(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        call: &C,
    ) -> Result<C::Return, Revert> {
        self.require_code(target)?;
        let output = self.call(caller, target, value, call.abi_encode())?;
        C::abi_decode_returns(&output, false).map_err(|_| Revert::empty())
    }

    /// Typed `STATICCALL`.
    pub fn static_call_sol<C: SolCall>(
        &mut self,
        caller: Address,
        target: Address,
        call: &C,
    ) -> Result<C::Return, Revert> {
        self.require_code(target)?;
        let output = self.static_call(caller, target, call.abi_encode())?;
        C::abi_decode_returns(&output, false).map_err(|_| Revert::empty())
    }

    /// `CREATE`: derive the address from `creator`'s nonce, install `code`
    /// and run its constructor with `value` attached.
    pub fn create(
        &mut self,
        creator: Address,
        code: Arc<dyn Contract>,
        value: U256,
    ) -> Result<Address, Revert> {
        self.ensure_writable()?;
        let creator_account = self.accounts.entry(creator).or_default();
        let nonce = creator_account.nonce;
        creator_account.nonce += 1;
        let address = creator.create(nonce);

        if self.accounts.get(&address).is_some_and(|a| a.code.is_some() || a.nonce != 0) {
            warn!(%address, "create collision");
            return Err(Revert::empty());
        }

        let frame = Frame {
            kind: CallKind::Create,
            address,
            code_address: address,
            caller: creator,
            value,
            input: Bytes::new(),
            is_static: false,
        };
        let name = code.name();
        self.enter(frame, Some(code))?;
        debug!(%creator, %address, nonce, contract = name, "contract created");
        Ok(address)
    }

    /// `CREATE` from artifact init code.
    pub fn create_from_init_code(
        &mut self,
        creator: Address,
        init_code: &[u8],
        value: U256,
    ) -> Result<Address, Revert> {
        let code = self.artifacts.instantiate(init_code)?;
        self.create(creator, code, value)
    }

    /// `SELFDESTRUCT`: remove `address` and send its balance to `beneficiary`.
    pub fn self_destruct(&mut self, address: Address, beneficiary: Address) -> Result<(), Revert> {
        self.ensure_writable()?;
        let balance = self.accounts.remove(&address).map(|a| a.balance).unwrap_or_default();
        if beneficiary != address {
            self.fund(beneficiary, balance);
        }
        debug!(%address, %beneficiary, %balance, "self-destructed");
        Ok(())
    }

    /// Plain ETH transfer between accounts, outside any frame.
    pub fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), Revert> {
        self.ensure_writable()?;
        self.move_balance(from, to, value)
    }

    // ── internals ───────────────────────────────────────────────────────────

    fn require_code(&self, target: Address) -> Result<(), Revert> {
        if self.has_code(target) {
            Ok(())
        } else {
            debug!(%target, "call to account without code");
            Err(Revert::empty())
        }
    }

    fn ensure_writable(&self) -> Result<(), Revert> {
        if self.is_static {
            Err(Revert::empty())
        } else {
            Ok(())
        }
    }

    fn move_balance(&mut self, from: Address, to: Address, value: U256) -> Result<(), Revert> {
        if value.is_zero() {
            return Ok(());
        }
        let from_balance = self.balance(from);
        if from_balance < value {
            debug!(%from, %to, %value, %from_balance, "insufficient balance for transfer");
            return Err(Revert::empty());
        }
        self.accounts.entry(from).or_default().balance = from_balance - value;
        self.fund(to, value);
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint { accounts: self.accounts.clone(), logs: self.logs.len() }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.accounts = checkpoint.accounts;
        self.logs.truncate(checkpoint.logs);
    }

    fn enter(&mut self, frame: Frame, constructor: Option<Arc<dyn Contract>>) -> Result<Bytes, Revert> {
        if self.depth >= MAX_CALL_DEPTH {
            warn!(depth = self.depth, "call depth exceeded");
            return Err(Revert::empty());
        }
        let checkpoint = self.checkpoint();
        let was_static = self.is_static;
        self.is_static |= frame.is_static;
        self.depth += 1;

        let result = self.run(&frame, constructor);

        self.depth -= 1;
        self.is_static = was_static;
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    fn run(&mut self, frame: &Frame, constructor: Option<Arc<dyn Contract>>) -> Result<Bytes, Revert> {
        trace!(
            kind = ?frame.kind,
            address = %frame.address,
            code = %frame.code_address,
            caller = %frame.caller,
            value = %frame.value,
            selector = %frame.selector(),
            depth = self.depth,
            "frame"
        );
        if frame.kind != CallKind::DelegateCall && !frame.value.is_zero() {
            self.ensure_writable()?;
            self.move_balance(frame.caller, frame.address, frame.value)?;
        }
        if let Some(code) = constructor {
            let account = self.accounts.entry(frame.address).or_default();
            account.code = Some(code.clone());
            account.nonce = 1;
            code.construct(self, frame)?;
            return Ok(Bytes::new());
        }
        match self.code(frame.code_address) {
            Some(code) => code.execute(self, frame),
            None => Ok(Bytes::new()),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageId;
    use alloy_primitives::address;
    use alloy_sol_types::sol;

    sol! {
        function bump(uint256 by) returns (uint256);
        function fail();
        function poke(address target);
        event Bumped(uint256 value);
    }

    #[derive(Debug, Clone, Default)]
    struct CounterStorage {
        value: U256,
    }

    impl StorageRegion for CounterStorage {
        const ID: StorageId = StorageId::TestContract;
    }

    struct Counter;

    impl Contract for Counter {
        fn name(&self) -> &'static str {
            "Counter"
        }

        fn construct(&self, evm: &mut Evm, frame: &Frame) -> Result<(), Revert> {
            evm.storage_mut(frame.address, |s: &mut CounterStorage| s.value = U256::from(100u64))
        }

        fn execute(&self, evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
            match frame.selector().0 {
                bumpCall::SELECTOR => {
                    let call: bumpCall = frame.decode()?;
                    let value = evm.storage_mut(frame.address, |s: &mut CounterStorage| {
                        s.value += call.by;
                        s.value
                    })?;
                    evm.emit(frame.address, &Bumped { value })?;
                    Ok(bumpCall::abi_encode_returns(&(value,)).into())
                }
                failCall::SELECTOR => {
                    evm.storage_mut(frame.address, |s: &mut CounterStorage| s.value = U256::ZERO)?;
                    Err(Revert::reason("nope"))
                }
                pokeCall::SELECTOR => {
                    let call: pokeCall = frame.decode()?;
                    evm.static_call(frame.address, call.target, bumpCall { by: U256::from(1u64) }.abi_encode())
                }
                _ => Err(Revert::empty()),
            }
        }
    }

    const ALICE: Address = address!("00000000000000000000000000000000000a11ce");

    fn value_of(evm: &Evm, at: Address) -> U256 {
        evm.storage(at, |s: &CounterStorage| s.value)
    }

    #[test]
    fn create_runs_constructor_and_derives_address() {
        let mut evm = Evm::default();
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::ZERO).unwrap();
        assert_eq!(counter, ALICE.create(0));
        assert_eq!(evm.nonce(ALICE), 1);
        assert_eq!(evm.nonce(counter), 1);
        assert_eq!(value_of(&evm, counter), U256::from(100u64));
    }

    #[test]
    fn call_updates_storage_and_logs() {
        let mut evm = Evm::default();
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::ZERO).unwrap();
        let out = evm
            .transact_sol(ALICE, counter, U256::ZERO, &bumpCall { by: U256::from(5u64) })
            .unwrap();
        assert_eq!(out._0, U256::from(105u64));
        let events = evm.events::<Bumped>();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, counter);
        assert_eq!(events[0].1.value, U256::from(105u64));
    }

    #[test]
    fn revert_rolls_back_frame() {
        let mut evm = Evm::default();
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::ZERO).unwrap();
        let err = evm.transact(ALICE, counter, U256::ZERO, failCall {}.abi_encode()).unwrap_err();
        assert_eq!(err.reason_string().as_deref(), Some("nope"));
        assert_eq!(value_of(&evm, counter), U256::from(100u64));
    }

    #[test]
    fn failed_value_transfer_reverts() {
        let mut evm = Evm::default();
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::ZERO).unwrap();
        let err = evm
            .transact(ALICE, counter, U256::from(1u64), bumpCall { by: U256::from(1u64) }.abi_encode())
            .unwrap_err();
        assert!(err.is_empty());
        assert_eq!(value_of(&evm, counter), U256::from(100u64));
    }

    #[test]
    fn static_frames_reject_writes() {
        let mut evm = Evm::default();
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::ZERO).unwrap();
        let err = evm
            .transact(ALICE, counter, U256::ZERO, pokeCall { target: counter }.abi_encode())
            .unwrap_err();
        assert!(err.is_empty());
        assert_eq!(value_of(&evm, counter), U256::from(100u64));
    }

    #[test]
    fn codeless_targets() {
        let mut evm = Evm::default();
        evm.fund(ALICE, U256::from(10u64));
        let bob = address!("0000000000000000000000000000000000000b0b");
        assert!(evm.call(ALICE, bob, U256::from(3u64), Bytes::new()).unwrap().is_empty());
        assert_eq!(evm.balance(bob), U256::from(3u64));
        assert!(evm.call_sol(ALICE, bob, U256::ZERO, &failCall {}).is_err());
    }

    #[test]
    fn self_destruct_pays_beneficiary() {
        let mut evm = Evm::default();
        evm.fund(ALICE, U256::from(10u64));
        let counter = evm.deploy(ALICE, Arc::new(Counter), U256::from(4u64)).unwrap();
        assert_eq!(evm.balance(counter), U256::from(4u64));
        evm.self_destruct(counter, ALICE).unwrap();
        assert!(!evm.has_code(counter));
        assert_eq!(evm.balance(ALICE), U256::from(10u64));
    }
}
