use anyhow::{anyhow, Context, Result};
use certify_core::{Address, LedgerSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Deployment address the sandbox gives the identity registry
pub const SANDBOX_IDENTITY_REGISTRY: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

/// Deployment address the sandbox gives the credential ledger
pub const SANDBOX_CREDENTIAL_LEDGER: &str = "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512";

/// Default sandbox owner
pub const SANDBOX_OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Everything the sandbox needs to survive between invocations
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SandboxState {
    /// Contract state of both ledgers
    pub ledger: LedgerSnapshot,

    /// Content store blobs keyed by identifier
    pub content: BTreeMap<String, Vec<u8>>,
}

impl SandboxState {
    pub fn new(owner: Address) -> Self {
        Self {
            ledger: LedgerSnapshot::new(
                Address::new(SANDBOX_IDENTITY_REGISTRY),
                Address::new(SANDBOX_CREDENTIAL_LEDGER),
                owner,
            ),
            content: BTreeMap::new(),
        }
    }
}

/// Reads and writes the sandbox state file
pub struct PersistenceManager {
    path: PathBuf,
}

impl PersistenceManager {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the state, or `None` if the sandbox was never initialized
    pub fn load(&self) -> Result<Option<SandboxState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let state = serde_json::from_str(&contents)
            .with_context(|| format!("Sandbox state at {} is corrupt", self.path.display()))?;
        Ok(Some(state))
    }

    /// Save state to disk, creating the parent directory if needed
    pub fn save(&self, state: &SandboxState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, json).with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    pub fn remove(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Get default persistence path based on the system
pub fn get_default_persistence_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join("certify").join("sandbox.json"))
}
