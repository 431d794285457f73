//! Engine - orchestrates one table read end to end.
//!
//! analyze -> plan -> assemble -> execute -> optimize -> project.
//! The engine owns the registry, settings and the diagnostic sink; the
//! datastore is passed per call so one engine serves many connections.

use std::sync::Arc;

use crate::analyze;
use crate::assemble;
use crate::config::Settings;
use crate::diag::{DiagnosticSink, Diagnostics};
use crate::error::EngineError;
use crate::exec::{self, Datastore};
use crate::optimize;
use crate::plan;
use crate::project::{self, TableResponse};
use crate::request::TableRequest;
use crate::schema::ModelRegistry;

/// The read-query engine.
pub struct Engine {
    registry: Arc<ModelRegistry>,
    settings: Settings,
    diag: Diagnostics,
}

impl Engine {
    /// Engine with default settings and log-backed diagnostics.
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            settings: Settings::default(),
            diag: Diagnostics::log(),
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the diagnostic sink (tests inject a collecting sink here).
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diag = Diagnostics::new(sink);
        self
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one table read.
    ///
    /// Shape validation and token resolution are the only failures before
    /// execution; everything clause-level degrades with diagnostics.
    pub fn fetch(
        &self,
        store: &dyn Datastore,
        request: &TableRequest,
    ) -> Result<TableResponse, EngineError> {
        if request.model.trim().is_empty() {
            return Err(EngineError::Request("model is required".into()));
        }
        if request.columns.is_empty() {
            return Err(EngineError::Request("columns are required".into()));
        }

        let entity = self.registry.resolve(&request.model)?;
        let graph = self.registry.graph()?;

        let per_page = request
            .per_page
            .unwrap_or(self.settings.per_page)
            .clamp(1, self.settings.max_per_page);
        let page = request.page.unwrap_or(1).max(1);

        let analysis = analyze::analyze(&entity, &graph, &request.columns, &self.diag);
        let eager = plan::plan(&entity, &graph, &analysis, &self.diag);
        let query_plan = assemble::assemble(
            &entity,
            &graph,
            &self.registry,
            request,
            &analysis,
            eager,
            page,
            per_page,
            &self.diag,
        );

        let mut executed = exec::run(
            store,
            &self.registry,
            &graph,
            &entity,
            &query_plan,
            &self.diag,
        )?;

        optimize::optimize(
            store,
            &self.registry,
            &graph,
            &entity,
            &query_plan.eager,
            &analysis.computed,
            &mut executed.rows,
            &self.diag,
        )?;

        Ok(project::respond(
            store,
            &self.registry,
            &entity,
            request,
            &query_plan,
            executed,
            &self.settings.path,
            &self.diag,
        )?)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish()
    }
}
