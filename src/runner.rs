use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::assertion::AssertionEvaluator;
use crate::case_model::{parse_validate, CaseDescriptor};
use crate::case_source::read_case_file;
use crate::config::RunnerConfig;
use crate::error::{AssertionError, Result, TransportError};
use crate::extraction::ExtractionEngine;
use crate::lookup::DatabaseLookup;
use crate::registry::HelperRegistry;
use crate::response::CaseResponse;
use crate::substitution::SubstitutionEngine;
use crate::transport::{HttpTransport, RequestSpec, Transport};
use crate::variable_store::VariableStore;

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
    /// Cases skipped because an earlier case in their flow failed.
    pub skipped: usize,
}

impl RunSummary {
    pub fn is_successful(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

/// Orchestrates the standard case flow: substitute the request, dispatch it,
/// extract variables from the response, then assert.
pub struct CaseRunner {
    store: Arc<VariableStore>,
    substitution: SubstitutionEngine,
    extraction: ExtractionEngine,
    assertion: AssertionEvaluator,
    transport: Arc<dyn Transport>,
}

impl CaseRunner {
    /// Runner wired from configuration: file-backed store, built-in helper
    /// set, shared HTTP session, no database collaborator.
    pub fn new(config: &RunnerConfig, config_path: &Path) -> Self {
        let store = Arc::new(VariableStore::new(&config.store_path));
        let registry = Arc::new(HelperRegistry::with_builtins(&config.store_path, config_path));
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config));
        Self::assemble(store, registry, transport, None)
    }

    /// Runner from explicit parts. Used for custom transports, helper sets
    /// and database collaborators.
    pub fn assemble(
        store: Arc<VariableStore>,
        registry: Arc<HelperRegistry>,
        transport: Arc<dyn Transport>,
        lookup: Option<Arc<dyn DatabaseLookup>>,
    ) -> Self {
        let assertion = match lookup {
            Some(lookup) => AssertionEvaluator::with_lookup(lookup),
            None => AssertionEvaluator::new(),
        };
        Self {
            substitution: SubstitutionEngine::new(registry, store.clone()),
            extraction: ExtractionEngine::new(store.clone()),
            assertion,
            transport,
            store,
        }
    }

    pub fn store(&self) -> &Arc<VariableStore> {
        &self.store
    }

    /// Execute one case end to end.
    ///
    /// Transport failure and assertion failure are fatal to the case;
    /// extraction misses are logged and absorbed.
    pub async fn run_case(&self, case: &CaseDescriptor) -> Result<CaseResponse> {
        log::info!(
            "feature: {} | story: {} | case: {}",
            case.feature,
            case.story,
            case.title
        );

        let resolved = self.substitution.substitute(&case.request)?;
        let request: RequestSpec = serde_json::from_value(resolved)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        // no extraction or assertion on a failed dispatch
        let response = self.transport.dispatch(&request).await?;

        if let Some(extract) = &case.extract {
            for (name, rule) in extract {
                self.extraction.extract(&response, name, rule);
            }
        }

        match &case.validate {
            Some(validate) => {
                // expected descriptors may reference extracted variables
                let substituted = self.substitution.substitute(validate)?;
                let kinds = parse_validate(&substituted)?;
                for (kind, rules) in &kinds {
                    self.assertion.evaluate(&response, kind, rules).await?;
                }
            }
            None => {
                log::info!(
                    "case '{}' has no explicit assertions, checking HTTP status 200",
                    case.title
                );
                if response.status_code != 200 {
                    return Err(AssertionError::Failed {
                        label: "default status check".to_string(),
                        expected: "200".to_string(),
                        actual: response.status_code.to_string(),
                    }
                    .into());
                }
            }
        }

        Ok(response)
    }

    /// Execute a flow of cases sequentially against the shared store. The
    /// first fatal case aborts the flow's remaining cases.
    pub async fn run_flow(&self, flow: &[CaseDescriptor], summary: &mut RunSummary) {
        for (position, case) in flow.iter().enumerate() {
            match self.run_case(case).await {
                Ok(_) => {
                    log::info!("case '{}' passed\n", case.title);
                    summary.passed += 1;
                }
                Err(e) => {
                    log::error!("case '{}' failed: {}\n", case.title, e);
                    summary.failed += 1;
                    summary.skipped += flow.len() - position - 1;
                    return;
                }
            }
        }
    }

    /// Run every flow of every file. The variable store is flushed exactly
    /// once, before the first case.
    pub async fn run_files(&self, files: &[PathBuf]) -> Result<RunSummary> {
        self.store.clear()?;
        let mut summary = RunSummary::default();
        for path in files {
            let flows = match read_case_file(path) {
                Ok(flows) => flows,
                Err(e) => {
                    log::error!("cannot load {}: {}", path.display(), e);
                    summary.failed += 1;
                    continue;
                }
            };
            for flow in &flows {
                self.run_flow(flow, &mut summary).await;
            }
        }
        log::info!(
            "run finished: {} passed, {} failed, {} skipped",
            summary.passed,
            summary.failed,
            summary.skipped
        );
        Ok(summary)
    }
}
