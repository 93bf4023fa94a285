pub mod authority;
pub mod certificates;
pub mod content;
pub mod identity;
pub mod request;
pub mod sandbox;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;

use certify_core::{
    Address, CertifyConfig, CertifyEngine, ContentGateway, ContentResolver, InMemoryLedger,
    LedgerGateway, MemoryContentStore, RetryPolicy, Session,
};

use crate::persistence::{PersistenceManager, SandboxState};

/// Options shared by every subcommand
pub struct GlobalOpts {
    pub session: Session,
    pub json: bool,
    pub config: CertifyConfig,
    pub state_path: PathBuf,
}

impl GlobalOpts {
    /// The active account, required by commands that write
    pub fn account(&self) -> Result<&Address> {
        self.session
            .account()
            .ok_or_else(|| anyhow!("This command needs an account: pass --account <0x...>"))
    }

    /// `explicit` if given, otherwise the active account
    pub fn address_or_account(&self, explicit: Option<&str>) -> Result<Address> {
        match explicit {
            Some(raw) => parse_address(raw),
            None => self.account().cloned(),
        }
    }
}

/// Engine over the persisted in-process ledger and content store
pub struct Sandbox {
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<MemoryContentStore>,
    pub engine: CertifyEngine,
    persistence: PersistenceManager,
}

impl Sandbox {
    pub fn from_state(state: SandboxState, persistence: PersistenceManager, config: &CertifyConfig) -> Self {
        let ledger = Arc::new(InMemoryLedger::from_snapshot(state.ledger));
        let store = Arc::new(MemoryContentStore::from_blobs("sandbox", state.content));

        let gateway = LedgerGateway::new(ledger.clone(), ledger.contracts())
            .with_finality_timeout(config.ledger.finality_timeout());
        let gateways: Vec<Arc<dyn ContentGateway>> = vec![store.clone()];
        let content = ContentResolver::new(gateways, store.clone()).with_retry_policy(RetryPolicy::none());
        let engine = CertifyEngine::new(gateway, content).with_fan_out(config.directory.fan_out);

        Self {
            ledger,
            store,
            engine,
            persistence,
        }
    }

    /// Open the sandbox at the configured state path
    pub fn open(opts: &GlobalOpts) -> Result<Self> {
        let persistence = PersistenceManager::new(opts.state_path.clone());
        let state = persistence.load()?.ok_or_else(|| {
            anyhow!(
                "No sandbox at {}; run `sandbox init` first",
                opts.state_path.display()
            )
        })?;
        Ok(Self::from_state(state, persistence, &opts.config))
    }

    /// Write ledger and content state back to disk
    pub fn save(&self) -> Result<()> {
        let state = SandboxState {
            ledger: self.ledger.snapshot(),
            content: self.store.export(),
        };
        self.persistence.save(&state).context("Failed to save sandbox state")
    }
}

pub fn parse_address(raw: &str) -> Result<Address> {
    Address::parse(raw).with_context(|| format!("'{}' is not a valid account address", raw))
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `0x1234…abcd` form for table cells
pub fn short_address(address: &Address) -> String {
    let chars: Vec<char> = address.as_str().chars().collect();
    if chars.len() > 14 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}…{}", head, tail)
    } else {
        address.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SANDBOX_OWNER;
    use certify_core::{ProfileInput, Role, StudentProfile};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sandbox_state_survives_reopen() -> Result<()> {
        let temp_dir = tempdir()?;
        let opts = GlobalOpts {
            session: Session::connected(parse_address("0x00000000000000000000000000000000000000bb")?),
            json: false,
            config: CertifyConfig::default(),
            state_path: temp_dir.path().join("sandbox.json"),
        };
        assert!(Sandbox::open(&opts).is_err());

        let persistence = PersistenceManager::new(opts.state_path.clone());
        persistence.save(&SandboxState::new(parse_address(SANDBOX_OWNER)?))?;

        let sandbox = Sandbox::open(&opts)?;
        let profile = StudentProfile {
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            student_id: "S100".to_string(),
            extra: Default::default(),
        };
        sandbox
            .engine
            .registration()
            .register(&opts.session, Role::Student, ProfileInput::Student(profile))
            .await?;
        sandbox.save()?;

        let reopened = Sandbox::open(&opts)?;
        let found = reopened.engine.directory().find_student_by_external_id("S100").await?;
        assert_eq!(&found.address, opts.account()?);
        Ok(())
    }

    #[test]
    fn test_short_address() {
        let address = Address::new("0x00000000000000000000000000000000000000bb");
        assert_eq!(short_address(&address), "0x0000…00bb");

        // Hand-edited snapshots can carry anything
        let odd = Address::new("0xé€ü€ü€ü€ü€ü€ü€ü€");
        assert_eq!(short_address(&odd), "0xé€ü€…ü€ü€");
        assert_eq!(short_address(&Address::new("0xab")), "0xab");
    }
}
