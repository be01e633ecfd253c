use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::driver::{DriverError, PageDriver, SessionFactory};
use crate::extract::default_strategies;
use crate::harvest::{Harvester, Termination};
use crate::models::{KinaseName, KinaseResult, ResultLog, RunMetadata};
use crate::query::build_query;
use crate::store::{partial_path, StoreError, TabularStore};

/// What a finished run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub kinases_listed: usize,
    pub kinases_attempted: usize,
    pub results_written: usize,
    pub final_output: Option<PathBuf>,
    pub last_checkpoint: Option<PathBuf>,
    pub stopped_early: bool,
}

/// Read the kinase list from the configured input, then run the batch.
///
/// The input is read before any browser session is opened, so an unreadable
/// file or a missing kinase column never launches the browser. An empty list
/// yields an empty summary.
pub async fn run_from_store<F: SessionFactory, S: TabularStore>(
    factory: &F,
    store: &S,
    config: &Config,
) -> Result<RunSummary> {
    let kinases = store
        .read_kinases(&config.input_path, config.kinase_column.as_deref())
        .context("Error loading kinases from input file")?;
    if kinases.is_empty() {
        tracing::warn!("No kinases found in input file. Exiting...");
        return Ok(RunSummary::default());
    }
    RunController::new(factory, store, config).run(&kinases).await
}

/// Owns the browser session and the result log for one batch run.
pub struct RunController<'a, F: SessionFactory, S: TabularStore> {
    factory: &'a F,
    store: &'a S,
    config: &'a Config,
    session: Option<F::Driver>,
    log: ResultLog,
    extraction_time: String,
    summary: RunSummary,
}

impl<'a, F: SessionFactory, S: TabularStore> RunController<'a, F, S> {
    pub fn new(factory: &'a F, store: &'a S, config: &'a Config) -> Self {
        let extraction_time = config.extraction_time.clone().unwrap_or_else(|| {
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
        });
        Self {
            factory,
            store,
            config,
            session: None,
            log: ResultLog::new(),
            extraction_time,
            summary: RunSummary::default(),
        }
    }

    /// Process every kinase, then save and release the session.
    ///
    /// Failing to open the first session is an error. Once browsing has
    /// started every failure is absorbed and reflected in the summary; the
    /// output write is attempted even when the run stops early, and its
    /// failure is returned after the session has been released.
    pub async fn run(mut self, kinases: &[KinaseName]) -> Result<RunSummary> {
        tracing::info!("Starting extraction at {}", self.extraction_time);
        tracing::info!("User: {}", self.config.user_name);
        tracing::info!("Total kinases to process: {}", kinases.len());
        self.summary.kinases_listed = kinases.len();

        let driver = self
            .factory
            .launch()
            .await
            .context("Failed to initialize WebDriver")?;
        self.session = Some(driver);
        self.process_all(kinases).await;

        let saved = self.save_final();
        self.release().await;
        saved.context("Failed to save final results")?;
        Ok(self.summary)
    }

    async fn process_all(&mut self, kinases: &[KinaseName]) {
        let strategies = default_strategies::<F::Driver>(&self.config.selectors, &self.config.timings);
        let total = kinases.len();

        for (i, kinase) in kinases.iter().enumerate() {
            let idx = i + 1;
            tracing::info!("Processing kinase {}/{}: {}", idx, total, kinase);
            self.summary.kinases_attempted += 1;

            let Some(driver) = self.session.as_mut() else {
                break;
            };
            let query = build_query(kinase);
            let harvest = Harvester::new(driver, self.config, &strategies)
                .run(kinase.as_str(), &query)
                .await;

            let appended = match KinaseResult::from_papers(kinase.clone(), &harvest.papers) {
                Some(result) => {
                    self.log.append(result);
                    true
                }
                None => false,
            };

            match harvest.termination {
                Termination::SessionFault(fault) => {
                    if appended {
                        tracing::info!(
                            "Kept {} abstracts for {} collected before the failure",
                            harvest.papers.len(),
                            kinase
                        );
                    }
                    tracing::error!("Error processing kinase {}: {}", kinase, fault);
                    self.checkpoint();
                    if let Err(e) = self.recover().await {
                        tracing::error!(
                            "Failed to recover WebDriver ({}). Saving progress and exiting...",
                            e
                        );
                        self.summary.stopped_early = true;
                        break;
                    }
                }
                Termination::SearchFailed => {
                    tracing::warn!("Failed to search for {}", kinase);
                }
                _ if appended => {
                    tracing::info!(
                        "Successfully extracted {} abstracts for {} ({} results reported)",
                        harvest.papers.len(),
                        kinase,
                        harvest.total_results
                    );
                    if idx % self.config.checkpoint_every == 0 {
                        self.checkpoint();
                    }
                }
                _ => {
                    tracing::info!("No abstracts found for {}", kinase);
                }
            }

            tokio::time::sleep(self.config.timings.inter_kinase_pause).await;
        }
    }

    fn metadata(&self) -> RunMetadata {
        RunMetadata {
            extraction_timestamp: self.extraction_time.clone(),
            user: self.config.user_name.clone(),
            total_kinases_processed: self.log.len(),
        }
    }

    /// Overwrite the partial output with everything collected so far. Never fails the run.
    pub fn checkpoint(&mut self) {
        if self.log.is_empty() {
            return;
        }
        let path = partial_path(&self.config.output_path);
        match self.store.write_results(&path, self.log.entries(), &self.metadata()) {
            Ok(()) => {
                tracing::info!("Partial results saved to: {}", path.display());
                self.summary.last_checkpoint = Some(path);
            }
            Err(e) => tracing::warn!("Failed to save partial results: {}", e),
        }
    }

    fn save_final(&mut self) -> Result<(), StoreError> {
        if self.log.is_empty() {
            tracing::warn!("No abstracts collected; {} not written", self.config.output_path.display());
            return Ok(());
        }
        let path = &self.config.output_path;
        self.store.write_results(path, self.log.entries(), &self.metadata())?;
        tracing::info!("Final results saved to: {}", path.display());
        self.summary.results_written = self.log.len();
        self.summary.final_output = Some(path.clone());
        Ok(())
    }

    /// Replace the session with a freshly launched one.
    async fn recover(&mut self) -> Result<(), DriverError> {
        tracing::info!("Restarting the browser session");
        self.release().await;
        tokio::time::sleep(self.config.timings.recovery_pause).await;
        let driver = self.factory.launch().await?;
        self.session = Some(driver);
        Ok(())
    }

    /// Quit the current session if there is one. Errors are logged only.
    async fn release(&mut self) {
        if let Some(mut driver) = self.session.take() {
            if let Err(e) = driver.quit().await {
                tracing::warn!("Error while closing the browser: {}", e);
            }
        }
    }
}
