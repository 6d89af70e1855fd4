//! Archive manager - the run state machine
//!
//! ```text
//! NOT_STARTED --start--> FETCHING --continue*--> PACKAGING --continue--> DONE
//!                            |                       |
//!                            +------ cancel ---------+----> CANCELLED
//!                            +-- write failure ------+----> ERROR
//! ```
//!
//! Each `continue` does one bounded slice of work and returns, so a caller
//! can poll it and a run survives process restarts.

use crate::archive::ArchiveCreator;
use crate::config::check_requirements;
use crate::context::AppContext;
use crate::crawler::{fetch_batch, BatchItem};
use crate::extract::{extract_urls, ContentKind};
use crate::state::{Action, ArchiveState, PageStatus, RunState};
use crate::storage::{ActivityEntry, CheckOutcome, SqliteStorage, Storage};
use crate::url::{is_local, normalize_parsed, normalize_url};
use crate::{MirrorError, Result};
use chrono::Utc;
use serde::Serialize;
use std::sync::MutexGuard;
use url::Url;

/// What the control surface reports after every action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlResponse {
    pub state_name: String,
    pub done: bool,
    pub activity_log: Vec<ActivityEntry>,
}

/// Drives a mirror run
pub struct ArchiveManager {
    ctx: AppContext,
}

impl ArchiveManager {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Performs one control action and reports the resulting state
    pub async fn perform(&self, action: Action) -> Result<ControlResponse> {
        match action {
            Action::Start => self.start()?,
            Action::Continue => self.continue_run().await?,
            Action::Cancel => self.cancel()?,
        }
        self.response()
    }

    /// Performs an action given by name (`start`, `continue` or `cancel`)
    pub async fn perform_named(&self, action: &str) -> Result<ControlResponse> {
        let action =
            Action::parse(action).ok_or_else(|| MirrorError::UnknownAction(action.to_string()))?;
        self.perform(action).await
    }

    /// Starts a fresh run
    ///
    /// Refuses to start when the configuration requirements are not met.
    /// Any run in progress is discarded.
    pub fn start(&self) -> Result<()> {
        let config = &self.ctx.config;

        let report = check_requirements(config, self.ctx.fs.as_ref());
        if !report.is_empty() {
            return Err(MirrorError::Requirements(report));
        }

        let origin = config.origin()?;
        let keep_query = config.crawler.keep_query_strings;
        let archive_name = format!("static-mirror-{}", Utc::now().format("%Y%m%d-%H%M%S"));

        let working_dir = config.output.temp_files_dir.join(&archive_name);
        if self.ctx.fs.exists(&working_dir) {
            self.ctx.fs.remove_dir_all(&working_dir)?;
        }
        self.ctx.fs.create_dir_all(&working_dir)?;

        let mut storage = self.storage()?;
        let previous = storage.load_run_state()?;
        if previous.state.is_active() {
            tracing::warn!("Discarding run in progress ({})", previous.state);
        }

        storage.reset()?;
        storage.append_log("setup", "Setting up")?;

        storage.find_or_create(origin.as_str(), None)?;
        for raw in &config.site.additional_urls {
            match normalize_url(raw, keep_query) {
                Ok(url) => {
                    storage.find_or_create(url.as_str(), None)?;
                }
                Err(e) => tracing::warn!("Skipping additional URL {}: {}", raw, e),
            }
        }

        let mut run = RunState::started(archive_name, self.ctx.config_hash.clone());
        run.remaining = storage.count_by_status(PageStatus::Unchecked)?;
        storage.save_run_state(&run)?;

        tracing::info!(
            "Started run {} with {} seed URLs",
            run.archive_name.as_deref().unwrap_or_default(),
            run.remaining
        );
        Ok(())
    }

    /// Performs the next slice of work
    ///
    /// Valid only while FETCHING or PACKAGING.
    pub async fn continue_run(&self) -> Result<()> {
        let run = self.storage()?.load_run_state()?;

        match run.state {
            ArchiveState::Fetching => self.fetch_step(run).await,
            ArchiveState::Packaging => self.package_step(run),
            state => Err(MirrorError::InvalidAction {
                action: Action::Continue,
                state,
            }),
        }
    }

    /// Cancels the run; committed pages are kept
    ///
    /// A no-op once the run has finished.
    pub fn cancel(&self) -> Result<()> {
        let mut storage = self.storage()?;
        let mut run = storage.load_run_state()?;

        if run.state.is_terminal() {
            tracing::debug!("Run already finished ({}), nothing to cancel", run.state);
            return Ok(());
        }

        run.finish(ArchiveState::Cancelled);
        storage.save_run_state(&run)?;
        storage.append_log("cancel", "Cancelled")?;

        tracing::info!("Run cancelled after {} pages", run.processed);
        Ok(())
    }

    pub fn has_finished(&self) -> Result<bool> {
        Ok(self.run_state()?.state.is_terminal())
    }

    pub fn state_name(&self) -> Result<String> {
        Ok(self.run_state()?.state.to_string())
    }

    pub fn status_messages(&self) -> Result<Vec<ActivityEntry>> {
        Ok(self.storage()?.log_entries()?)
    }

    pub fn run_state(&self) -> Result<RunState> {
        Ok(self.storage()?.load_run_state()?)
    }

    pub fn response(&self) -> Result<ControlResponse> {
        let storage = self.storage()?;
        let run = storage.load_run_state()?;

        Ok(ControlResponse {
            state_name: run.state.to_string(),
            done: run.state.is_terminal(),
            activity_log: storage.log_entries()?,
        })
    }

    fn storage(&self) -> Result<MutexGuard<'_, SqliteStorage>> {
        self.ctx
            .storage
            .lock()
            .map_err(|_| MirrorError::Storage("storage lock poisoned".to_string()))
    }

    fn creator(&self, run: &RunState) -> Result<ArchiveCreator> {
        let archive_name = run
            .archive_name
            .as_deref()
            .ok_or_else(|| MirrorError::Storage("run has no archive name".to_string()))?;

        Ok(ArchiveCreator::new(
            self.ctx.config.clone(),
            self.ctx.fs.clone(),
            archive_name,
        )?)
    }

    async fn fetch_step(&self, mut run: RunState) -> Result<()> {
        let batch_size = self.ctx.config.crawler.batch_size;
        let pages = self.storage()?.next_unchecked(batch_size)?;

        if pages.is_empty() {
            let mut storage = self.storage()?;
            run.state = ArchiveState::Packaging;
            storage.save_run_state(&run)?;
            storage.append_log("fetch", &format!("Fetched {} pages/files", run.processed))?;
            tracing::info!("Frontier exhausted after {} pages, packaging", run.processed);
            return Ok(());
        }

        let creator = self.creator(&run)?;
        let items = fetch_batch(
            self.ctx.fetcher.clone(),
            pages,
            self.ctx.config.crawler.concurrency as usize,
        )
        .await;

        let mut storage = self.storage()?;

        // Cancelled from elsewhere while the batch was in flight
        let current = storage.load_run_state()?;
        if current.state != ArchiveState::Fetching {
            tracing::info!("Run is {}; dropping fetched batch", current.state);
            return Ok(());
        }

        let origin = self.ctx.config.origin()?;
        for item in &items {
            if let Err(message) = self.commit_item(&mut storage, &creator, &origin, item) {
                return self.fail(&mut storage, run, message);
            }
        }

        run.processed = storage.count_by_status(PageStatus::CheckedSuccess)?
            + storage.count_by_status(PageStatus::CheckedError)?;
        run.remaining = storage.count_by_status(PageStatus::Unchecked)?;
        storage.save_run_state(&run)?;

        tracing::info!(
            "Fetched {} of {} pages/files",
            run.processed,
            run.processed + run.remaining
        );
        Ok(())
    }

    /// Records one fetched page
    ///
    /// Fetch failures are recorded on the page. A failure to write the page
    /// to disk is returned as `Err(message)` and ends the run.
    fn commit_item(
        &self,
        storage: &mut SqliteStorage,
        creator: &ArchiveCreator,
        origin: &Url,
        item: &BatchItem,
    ) -> std::result::Result<(), String> {
        let page = &item.page;
        let keep_query = self.ctx.config.crawler.keep_query_strings;

        let outcome = match &item.result {
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", page.url, e);
                log_or_warn(storage, "fetch", &format!("Failed to fetch {}: {}", page.url, e));
                CheckOutcome::error(e.status_code(), e.to_string())
            }
            Ok(fetched) if !is_local(&fetched.final_url, origin) => {
                let message = format!("Redirected to external URL {}", fetched.final_url);
                tracing::warn!("{}: {}", page.url, message);
                log_or_warn(storage, "fetch", &format!("Skipped {}: {}", page.url, message));
                CheckOutcome::error(Some(fetched.status_code), message)
            }
            Ok(fetched) => {
                if let Some(kind) = fetched
                    .content_type
                    .as_deref()
                    .and_then(ContentKind::from_content_type)
                {
                    let found = extract_urls(
                        kind,
                        &fetched.text(),
                        &fetched.final_url,
                        origin,
                        keep_query,
                    );
                    tracing::debug!(
                        "{}: {} local, {} external references",
                        page.url,
                        found.local.len(),
                        found.external.len()
                    );
                    for url in &found.local {
                        storage
                            .find_or_create(url.as_str(), Some(&page.url))
                            .map_err(|e| e.to_string())?;
                    }
                }

                // A redirect target gets its own file too
                if let Ok(final_url) = normalize_parsed(fetched.final_url.clone(), keep_query) {
                    if final_url.as_str() != page.url {
                        storage
                            .find_or_create(final_url.as_str(), Some(&page.url))
                            .map_err(|e| e.to_string())?;
                    }
                }

                let url = Url::parse(&page.url).map_err(|e| e.to_string())?;
                let file_path = creator.materialize(&url, fetched).map_err(|e| {
                    format!("Unable to write {}: {}", page.url, e)
                })?;

                log_or_warn(
                    storage,
                    "fetch",
                    &format!("Fetched {} ({})", page.url, fetched.status_code),
                );
                CheckOutcome::success(
                    fetched.status_code,
                    fetched.content_type.clone(),
                    Some(file_path),
                )
            }
        };

        storage
            .mark_checked(page.id, &outcome)
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn package_step(&self, mut run: RunState) -> Result<()> {
        let creator = self.creator(&run)?;
        tracing::info!("Packaging {}", creator.archive_name());

        match creator.package() {
            Ok(artifact) => {
                let mut storage = self.storage()?;
                run.artifact_path = Some(artifact.display().to_string());
                run.finish(ArchiveState::Done);
                storage.save_run_state(&run)?;
                storage.append_log("package", &format!("Created {}", artifact.display()))?;
                storage.append_log("done", &finished_message(&run))?;
                tracing::info!("Run finished: {}", artifact.display());
                Ok(())
            }
            Err(e) => {
                let mut storage = self.storage()?;
                self.fail(&mut storage, run, format!("Packaging failed: {}", e))
            }
        }
    }

    fn fail(&self, storage: &mut SqliteStorage, mut run: RunState, message: String) -> Result<()> {
        tracing::error!("{}", message);
        run.error_message = Some(message.clone());
        run.finish(ArchiveState::Error);
        storage.save_run_state(&run)?;
        storage.append_log("error", &message)?;
        Ok(())
    }
}

/// Appends to the activity log; a failure here never aborts the run
fn log_or_warn(storage: &mut SqliteStorage, key: &str, message: &str) {
    if let Err(e) = storage.append_log(key, message) {
        tracing::warn!("Failed to append to activity log: {}", e);
    }
}

fn finished_message(run: &RunState) -> String {
    match (run.started_at, run.finished_at) {
        (Some(start), Some(end)) => {
            let secs = (end - start).num_seconds().max(0);
            format!(
                "Done! Finished in {:02}:{:02}:{:02}",
                secs / 3600,
                (secs % 3600) / 60,
                secs % 60
            )
        }
        _ => "Done!".to_string(),
    }
}
