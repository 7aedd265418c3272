//! caseflow - a data-driven HTTP API test runner
//!
//! Test cases are declared in YAML documents (request definition, variable
//! extraction rules, assertion rules). The runtime engine executes each case:
//! send the request, extract variables into a run-scoped store, substitute
//! stored variables and helper-function expressions into subsequent requests,
//! and assert on the response.

pub mod error;
pub mod variable_store;
pub mod registry;
pub mod substitution;
pub mod extraction;
pub mod assertion;
pub mod response;
pub mod transport;
pub mod lookup;
pub mod case_model;
pub mod case_source;
pub mod config;
pub mod runner;

// Re-export commonly used types
pub use error::{
    AssertionError, CaseError, CaseFlowError, ExtractionError, LookupError, Result,
    SubstitutionError, TransportError,
};
pub use variable_store::VariableStore;
pub use registry::{HelperFn, HelperRegistry};
pub use substitution::SubstitutionEngine;
pub use extraction::{ExtractionEngine, ExtractionRule};
pub use assertion::{AssertionEvaluator, AssertionKind, AssertionRule, AssertionRules, SUPPORTED_KINDS};
pub use response::CaseResponse;
pub use transport::{HttpTransport, RequestSpec, Transport};
pub use lookup::{DatabaseLookup, FixtureLookup};
pub use case_model::{parse_validate, verify_case, CaseDescriptor};
pub use case_source::{discover_case_files, read_case_file, CaseFlow};
pub use config::RunnerConfig;
pub use runner::{CaseRunner, RunSummary};

/// Version information for the runner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
