// SPDX-License-Identifier: Apache-2.0

//! Security gate and execution governor for LLM-generated SQL.
//!
//! An NL→SQL service turns business questions into SQL through a
//! generative model, which makes the SQL untrusted input. This crate is
//! the trusted core that stands between generation and the database:
//! a pattern-based security gate with PII detection and cost estimation,
//! a table-access validator, a post-approval sanitizer, and an execution
//! governor enforcing timeouts and row ceilings.

pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod generator;
pub mod glossary;
pub mod observability;
pub mod pipeline;

use std::sync::Arc;

use config::Settings;
use error::QueryError;
use executor::{postgres::PostgresExecutor, ExecutorHandle};
use generator::GeneratorHandle;
use glossary::GlossaryService;
use pipeline::QueryPipeline;

pub use error::PipelineResult;
pub use gate::types::{PiiFlag, SecurityCheck, SecurityLevel};

/// Fully wired service state.
pub struct BiQueryService {
    pub pipeline: QueryPipeline,
    pub glossary: Arc<GlossaryService>,
}

impl BiQueryService {
    /// Wire the service from settings: load the glossary (fatal on
    /// failure), connect the executor if a database URL is configured,
    /// and build the pipeline.
    pub async fn from_settings(
        settings: Settings,
        generator: GeneratorHandle,
    ) -> Result<Self, QueryError> {
        let glossary = Arc::new(GlossaryService::load(&settings.glossary_path)?);

        let executor = match &settings.database_url {
            Some(url) => {
                let executor = PostgresExecutor::connect(url).await?;
                ExecutorHandle::Configured(Arc::new(executor))
            }
            None => ExecutorHandle::Unconfigured,
        };

        let pipeline = QueryPipeline::new(Arc::clone(&glossary), settings, executor, generator)?;

        Ok(Self { pipeline, glossary })
    }
}
