//! Contract artifacts: the simulator's stand-in for EVM init code.
//!
//! Init code is the ABI encoding of [`InitCode`] `{ artifact, args }`. The
//! host resolves `artifact` in an [`ArtifactRegistry`] and hands `args` (the
//! ABI-encoded constructor arguments) to the registered factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy_primitives::Bytes;
use alloy_sol_types::{sol, SolValue};
use tracing::debug;

use crate::contract::Contract;
use crate::revert::Revert;

sol! {
    /// Deployable init code.
    #[derive(Debug, PartialEq, Eq)]
    struct InitCode {
        string artifact;
        bytes args;
    }
}

/// Builds contract code from ABI-encoded constructor arguments.
pub type ArtifactFactory = Arc<dyn Fn(&[u8]) -> Result<Arc<dyn Contract>, Revert> + Send + Sync>;

/// Named contract factories.
#[derive(Clone, Default)]
pub struct ArtifactRegistry {
    factories: HashMap<String, ArtifactFactory>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `artifact`.
    pub fn register<F>(&mut self, artifact: impl Into<String>, factory: F)
    where
        F: Fn(&[u8]) -> Result<Arc<dyn Contract>, Revert> + Send + Sync + 'static,
    {
        let artifact = artifact.into();
        debug!(artifact = %artifact, "artifact registered");
        self.factories.insert(artifact, Arc::new(factory));
    }

    pub fn contains(&self, artifact: &str) -> bool {
        self.factories.contains_key(artifact)
    }

    /// Sorted artifact names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate contract code from raw init code.
    ///
    /// Unknown artifacts and malformed init code revert with no data, like a
    /// CREATE whose init code aborts.
    pub fn instantiate(&self, init_code: &[u8]) -> Result<Arc<dyn Contract>, Revert> {
        let InitCode { artifact, args } =
            InitCode::abi_decode(init_code, false).map_err(|_| Revert::empty())?;
        let factory = self.factories.get(&artifact).ok_or_else(Revert::empty)?;
        factory(&args)
    }
}

impl fmt::Debug for ArtifactRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactRegistry")
            .field("artifacts", &self.names())
            .finish()
    }
}

/// Encode init code for `artifact` with ABI-encoded constructor `args`.
pub fn init_code(artifact: &str, args: impl Into<Bytes>) -> Bytes {
    InitCode { artifact: artifact.to_string(), args: args.into() }
        .abi_encode()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Frame;
    use crate::evm::Evm;

    struct Echo;

    impl Contract for Echo {
        fn name(&self) -> &'static str {
            "Echo"
        }

        fn execute(&self, _evm: &mut Evm, frame: &Frame) -> Result<Bytes, Revert> {
            Ok(frame.input.clone())
        }
    }

    #[test]
    fn instantiate_known_artifact() {
        let mut registry = ArtifactRegistry::new();
        registry.register("Echo", |_args: &[u8]| Ok(Arc::new(Echo) as Arc<dyn Contract>));
        assert!(registry.contains("Echo"));
        let code = registry.instantiate(&init_code("Echo", Bytes::new())).unwrap();
        assert_eq!(code.name(), "Echo");
    }

    #[test]
    fn unknown_artifact_reverts_empty() {
        let registry = ArtifactRegistry::new();
        let err = registry
            .instantiate(&init_code("Missing", Bytes::new()))
            .err()
            .unwrap();
        assert!(err.is_empty());
        assert!(registry.instantiate(&[1, 2, 3]).is_err());
    }
}
