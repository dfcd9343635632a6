use std::sync::Arc;

use anyhow::{bail, Context, Result};
use medanchor_core::ledger::SimulatedLedger;
use medanchor_core::{
    Address, AnchoringCoordinator, AppConfig, DerivationPath, ErrorClassifier, HttpProfileStore,
    IdentityGenerator, InMemoryProfileStore, JsonRpcTransport, LedgerGateway, OnboardingCoordinator,
    ProfileStore, RegistrationCoordinator, RequestContext, SigningTransport,
};
use tracing::info;

/// Identity generator for the configured derivation path
pub fn identity_generator(config: &AppConfig) -> Result<IdentityGenerator> {
    let path: DerivationPath = config
        .derivation_path
        .parse()
        .with_context(|| format!("Invalid derivation path {:?}", config.derivation_path))?;
    Ok(IdentityGenerator::new().with_path(path))
}

/// Coordinators wired to either the configured JSON-RPC endpoint or an
/// in-process simulated registry
pub struct App {
    pub config: AppConfig,
    pub generator: Arc<IdentityGenerator>,
    pub gateway: Arc<LedgerGateway>,
    pub registration: Arc<RegistrationCoordinator>,
    pub anchoring: AnchoringCoordinator,
    pub onboarding: OnboardingCoordinator,
    simulated: Option<SimulatedLedger>,
}

impl App {
    pub fn build(mut config: AppConfig, simulate: bool) -> Result<Self> {
        let generator = Arc::new(identity_generator(&config)?);

        let (transport, simulated): (Arc<dyn SigningTransport>, Option<SimulatedLedger>) = if simulate {
            let ledger = SimulatedLedger::new(config.ledger.chain_id);
            config.ledger.contract_address = ledger.contract_address();
            (Arc::new(ledger.clone()), Some(ledger))
        } else {
            if config.ledger.contract_address.is_zero() {
                bail!("No registry contract configured; set ledger.contract_address or MEDANCHOR__LEDGER__CONTRACT_ADDRESS");
            }
            let transport = JsonRpcTransport::from_config(&config.ledger)
                .with_context(|| format!("Failed to set up JSON-RPC transport for {}", config.ledger.rpc_url))?;
            (Arc::new(transport), None)
        };

        let profiles: Arc<dyn ProfileStore> = match HttpProfileStore::from_config(&config.profile_store)
            .context("Failed to set up profile store")?
        {
            Some(store) => Arc::new(store),
            None => Arc::new(InMemoryProfileStore::new()),
        };

        info!(
            "Using {} transport on chain {} (registry {}), {} profile store",
            transport.name(),
            config.ledger.chain_id,
            config.ledger.contract_address,
            profiles.name()
        );

        let gateway = Arc::new(LedgerGateway::new(transport, config.ledger.clone()));
        let classifier = Arc::new(ErrorClassifier::default());
        let registration = Arc::new(RegistrationCoordinator::new(gateway.clone(), classifier.clone()));
        let anchoring = AnchoringCoordinator::new(registration.clone(), generator.clone(), classifier);
        let onboarding = OnboardingCoordinator::new(generator.clone(), registration.clone(), profiles);

        Ok(Self {
            config,
            generator,
            gateway,
            registration,
            anchoring,
            onboarding,
            simulated,
        })
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated.is_some()
    }

    /// Start a flow for `account`. The simulated signing session controls any account asked for.
    pub fn context(&self, account: Address) -> RequestContext {
        if let Some(ledger) = &self.simulated {
            ledger.authorize(account);
        }
        RequestContext::new(account)
    }
}
