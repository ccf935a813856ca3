//! Operator-facing facade over discovery and batch mutation

use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::ManagerConfig;
use crate::mutation::{
    BatchMutationEngine, MutationOutcome, MutationRequest, PackageMutator, UnlistPlan, plan_unlist,
};
use crate::tool::{NugetCli, ToolLocator};
use crate::version::calibrator::StatusCalibrator;
use crate::version::error::ResolveError;
use crate::version::resolver::{Resolution, ResolveOptions, VersionResolver};
use crate::version::source::{StatusAuthority, VersionSource};
use crate::version::sources::{
    CliToolSource, FlatContainerSource, GallerySource, RegistrationSource, ServiceIndex,
};
use crate::version::types::{PackageId, SourceSelector};

pub struct PackageManager {
    resolver: VersionResolver,
    engine: BatchMutationEngine,
    default_selector: SourceSelector,
    calibrate: bool,
}

/// Endpoints actually used after optional service index discovery
#[derive(Debug, Clone, PartialEq, Eq)]
struct Endpoints {
    flat_container: String,
    registration: String,
}

impl PackageManager {
    /// Wires the real sources, the NuGet CLI and the batch engine from
    /// `config`. One [`ToolLocator`] is shared by everything that runs the
    /// CLI, so the executable is located at most once.
    pub async fn connect(config: &ManagerConfig) -> Result<Self, reqwest::Error> {
        let client = config.http.build_client()?;
        let endpoints = Self::discover_endpoints(&client, config).await;

        let locator = Arc::new(ToolLocator::new(config.tool.path.clone()));
        let cli = Arc::new(NugetCli::new(locator, &config.registry.service_index_url));

        let registration = Arc::new(RegistrationSource::with_client(
            client.clone(),
            &endpoints.registration,
        ));
        let cli_source = Arc::new(CliToolSource::new(cli.clone()));

        let sources: Vec<Arc<dyn VersionSource>> = vec![
            Arc::new(FlatContainerSource::with_client(
                client.clone(),
                &endpoints.flat_container,
            )),
            registration.clone(),
            cli_source.clone(),
            Arc::new(GallerySource::with_client(client, &config.registry.gallery_url)),
        ];
        // The CLI knows the complete listed set; the registration API
        // refines individual versions it has catalog entries for.
        let authorities: Vec<Arc<dyn StatusAuthority>> = vec![cli_source, registration];

        let resolver = VersionResolver::new(sources)
            .with_calibrator(StatusCalibrator::new(authorities))
            .with_ordering(config.resolution.ordering);

        Ok(Self::build(
            resolver,
            cli,
            config.resolution.source,
            config.resolution.calibrate,
        ))
    }

    /// Build a manager with a custom resolver and mutator
    pub fn build(
        resolver: VersionResolver,
        mutator: Arc<dyn PackageMutator>,
        default_selector: SourceSelector,
        calibrate: bool,
    ) -> Self {
        Self {
            resolver,
            engine: BatchMutationEngine::new(mutator),
            default_selector,
            calibrate,
        }
    }

    async fn discover_endpoints(client: &reqwest::Client, config: &ManagerConfig) -> Endpoints {
        let configured = Endpoints {
            flat_container: config.registry.flat_container_url.clone(),
            registration: config.registry.registration_url.clone(),
        };
        if !config.registry.discover_endpoints {
            return configured;
        }

        match ServiceIndex::fetch(client, &config.registry.service_index_url).await {
            Ok(index) => {
                let endpoints = Endpoints {
                    flat_container: index
                        .package_base_address()
                        .map(str::to_string)
                        .unwrap_or(configured.flat_container),
                    registration: index
                        .registration_base()
                        .map(str::to_string)
                        .unwrap_or(configured.registration),
                };
                info!("Using discovered endpoints {:?}", endpoints);
                endpoints
            }
            Err(e) => {
                warn!("Service index discovery failed, using configured endpoints: {}", e);
                configured
            }
        }
    }

    /// Selector used by [`resolve`](Self::resolve)
    pub fn default_selector(&self) -> SourceSelector {
        self.default_selector
    }

    /// Resolves with the configured default selector and calibration setting
    pub async fn resolve(&self, package: &PackageId) -> Result<Resolution, ResolveError> {
        self.resolve_with(package, self.default_selector, self.calibrate).await
    }

    pub async fn resolve_with(
        &self,
        package: &PackageId,
        selector: SourceSelector,
        calibrate: bool,
    ) -> Result<Resolution, ResolveError> {
        self.resolver
            .resolve(package, selector, ResolveOptions { calibrate })
            .await
    }

    /// Versions currently visible on the registry, newest first
    ///
    /// Always runs both API sources and calibrates.
    pub async fn listed_versions(&self, package: &PackageId) -> Result<Vec<String>, ResolveError> {
        let resolution = self
            .resolve_with(package, SourceSelector::Comprehensive, true)
            .await?;
        Ok(resolution.result.listed_versions())
    }

    /// Resolves `package` and keeps the selected versions that are still listed
    pub async fn plan_unlist(
        &self,
        package: &PackageId,
        selected: &[String],
    ) -> Result<UnlistPlan, ResolveError> {
        let resolution = self
            .resolve_with(package, SourceSelector::Comprehensive, true)
            .await?;
        Ok(plan_unlist(&resolution.result, selected))
    }

    pub async fn run_batch<F>(
        &self,
        request: &MutationRequest,
        on_progress: F,
        cancel: CancelToken,
    ) -> MutationOutcome
    where
        F: FnMut(usize, usize) + Send,
    {
        self.engine.run(request, on_progress, cancel).await
    }

    /// Cancels the batch in flight; returns false when none is running
    pub fn request_cancel(&self) -> bool {
        self.engine.request_cancel()
    }
}
