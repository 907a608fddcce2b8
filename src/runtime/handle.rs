use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};
use tracing::{debug, info, warn};

use crate::{
    core::{
        expansion::ExpansionChange,
        numbering::NumberConflict,
        state::{Counts, JumpListState},
        view::{DateDisplay, EntryField, HydrationJob, JumpViewEntry, DEFAULT_DATE_FORMAT, HYDRATED_FIELDS},
    },
    engine::{
        blocking,
        hydration::{spawn_hydration_batch, HydrationResult},
        resolver::{save_with_resolution, SaveError, ShiftPolicy},
    },
    jump::{JumpRecord, JumpType},
    persist::{JumpRepository, RepoResult, StorageError},
    types::{Generation, JumpId, JumpNumber, JumpTypeId},
};

use super::events::JumpEvent;

/// Failure of a runtime request.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A repository call failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A save was rejected or aborted.
    #[error(transparent)]
    Save(#[from] SaveError),
    /// The runtime loop is gone.
    #[error("logbook runtime is not running")]
    ChannelClosed,
}

/// Runtime tuning and display settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Bound of the command queue.
    pub command_queue_bound: usize,
    /// Capacity of the broadcast event channel.
    pub event_capacity: usize,
    /// Upper bound on hydration jobs hitting the store at once; 0 = unbounded.
    pub max_concurrent_hydrations: usize,
    /// `chrono` format for displayed dates. An invalid format is replaced by
    /// [`DEFAULT_DATE_FORMAT`] with a warning.
    pub date_format: String,
    /// Fixed UTC offset for displayed dates; `None` uses the host zone.
    pub utc_offset_seconds: Option<i32>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            max_concurrent_hydrations: 0,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            utc_offset_seconds: None,
        }
    }
}

/// Result of a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The full set was replaced and published; hydration continues in the background.
    Loaded {
        /// New generation.
        generation: Generation,
        /// Counts after the load.
        counts: Counts,
    },
    /// Another load was already running; nothing was done.
    Skipped,
}

/// Point-in-time view of the scalar list state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListStatus {
    /// Total and filtered counts.
    pub counts: Counts,
    /// Current query as entered.
    pub query: String,
    /// Whether a load is running.
    pub busy: bool,
    /// Visible expanded entry.
    pub expanded_id: Option<JumpId>,
    /// Current full-set generation.
    pub generation: Generation,
    /// Hydration jobs still outstanding.
    pub pending_hydrations: usize,
}

/// Cloneable handle to the logbook runtime.
#[derive(Clone)]
pub struct LogbookHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<JumpEvent>,
    repo: Arc<dyn JumpRepository>,
}

enum Command {
    Load {
        resp: oneshot::Sender<Result<LoadOutcome, RuntimeError>>,
    },
    SetQuery {
        query: String,
        resp: oneshot::Sender<Counts>,
    },
    ToggleExpand {
        id: JumpId,
        resp: oneshot::Sender<Option<ExpansionChange>>,
    },
    CheckNumber {
        number: JumpNumber,
        exclude: Option<JumpId>,
        resp: oneshot::Sender<Option<NumberConflict>>,
    },
    NextNumber {
        resp: oneshot::Sender<JumpNumber>,
    },
    Save {
        record: JumpRecord,
        policy: ShiftPolicy,
        resp: oneshot::Sender<Result<JumpId, RuntimeError>>,
    },
    Delete {
        id: JumpId,
        resp: oneshot::Sender<Result<bool, RuntimeError>>,
    },
    FullSet {
        resp: oneshot::Sender<Vec<JumpViewEntry>>,
    },
    Filtered {
        resp: oneshot::Sender<Vec<JumpViewEntry>>,
    },
    Entry {
        id: JumpId,
        resp: oneshot::Sender<Option<JumpViewEntry>>,
    },
    Status {
        resp: oneshot::Sender<ListStatus>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct LoadFinished {
    result: RepoResult<Vec<JumpRecord>>,
    resp: Option<oneshot::Sender<Result<LoadOutcome, RuntimeError>>>,
}

/// Starts the single-writer loop that owns the list state.
///
/// Must be called from within a tokio runtime.
pub fn spawn_logbook(repo: Arc<dyn JumpRepository>, config: RuntimeConfig) -> LogbookHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<JumpEvent>(config.event_capacity);
    let (load_tx, mut load_rx) = mpsc::unbounded_channel::<LoadFinished>();
    let (hydration_tx, mut hydration_rx) = mpsc::unbounded_channel::<HydrationResult>();

    let format = if DateDisplay::is_valid_format(&config.date_format) {
        config.date_format.clone()
    } else {
        warn!(format = %config.date_format, "invalid date format; using {DEFAULT_DATE_FORMAT}");
        DEFAULT_DATE_FORMAT.to_string()
    };
    let display = DateDisplay {
        format,
        utc_offset_seconds: config.utc_offset_seconds,
    };
    let hydration_limit = (config.max_concurrent_hydrations > 0)
        .then(|| Arc::new(Semaphore::new(config.max_concurrent_hydrations)));

    let mut writer = Writer {
        state: JumpListState::new(display),
        repo: Arc::clone(&repo),
        events_tx: events_tx.clone(),
        load_tx,
        hydration_tx,
        hydration_limit,
        reload_pending: false,
    };

    tokio::spawn(async move {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break; };
                    if writer.handle_command(cmd).await {
                        break;
                    }
                }
                Some(done) = load_rx.recv() => {
                    writer.finish_load(done);
                }
                Some(result) = hydration_rx.recv() => {
                    writer.apply_hydration(result);
                }
            }
        }
    });

    LogbookHandle {
        cmd_tx,
        events_tx,
        repo,
    }
}

impl LogbookHandle {
    /// Subscribes to state change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<JumpEvent> {
        self.events_tx.subscribe()
    }

    /// Fetches all records and replaces the full set.
    ///
    /// Returns once the unhydrated listing is published. A call made while a
    /// load is running returns [`LoadOutcome::Skipped`].
    pub async fn load(&self) -> Result<LoadOutcome, RuntimeError> {
        self.request(|resp| Command::Load { resp }).await?
    }

    /// Sets the search query and returns the new counts.
    pub async fn set_query(&self, query: impl Into<String>) -> Result<Counts, RuntimeError> {
        let query = query.into();
        self.request(|resp| Command::SetQuery { query, resp }).await
    }

    /// Expands `id`, or collapses it when already expanded. `None` for unknown ids.
    pub async fn toggle_expand(&self, id: JumpId) -> Result<Option<ExpansionChange>, RuntimeError> {
        self.request(|resp| Command::ToggleExpand { id, resp }).await
    }

    /// Checks `number` against the loaded set without saving.
    pub async fn check_number(
        &self,
        number: JumpNumber,
        exclude: Option<JumpId>,
    ) -> Result<Option<NumberConflict>, RuntimeError> {
        self.request(|resp| Command::CheckNumber {
            number,
            exclude,
            resp,
        })
        .await
    }

    /// Suggested number for a new jump.
    pub async fn next_jump_number(&self) -> Result<JumpNumber, RuntimeError> {
        self.request(|resp| Command::NextNumber { resp }).await
    }

    /// Saves a new (`id == None`) or edited record, resolving number conflicts per `policy`.
    pub async fn save(&self, record: JumpRecord, policy: ShiftPolicy) -> Result<JumpId, RuntimeError> {
        self.request(|resp| Command::Save {
            record,
            policy,
            resp,
        })
        .await?
    }

    /// Deletes a record. Returns whether the store removed anything.
    pub async fn delete(&self, id: JumpId) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Delete { id, resp }).await?
    }

    /// Copy of the full set.
    pub async fn full_set(&self) -> Result<Vec<JumpViewEntry>, RuntimeError> {
        self.request(|resp| Command::FullSet { resp }).await
    }

    /// Copy of the filtered subset.
    pub async fn filtered(&self) -> Result<Vec<JumpViewEntry>, RuntimeError> {
        self.request(|resp| Command::Filtered { resp }).await
    }

    /// Copy of one loaded entry.
    pub async fn entry(&self, id: JumpId) -> Result<Option<JumpViewEntry>, RuntimeError> {
        self.request(|resp| Command::Entry { id, resp }).await
    }

    /// Scalar state snapshot.
    pub async fn status(&self) -> Result<ListStatus, RuntimeError> {
        self.request(|resp| Command::Status { resp }).await
    }

    /// Total and filtered counts.
    pub async fn counts(&self) -> Result<Counts, RuntimeError> {
        Ok(self.status().await?.counts)
    }

    /// Current query as entered.
    pub async fn query(&self) -> Result<String, RuntimeError> {
        Ok(self.status().await?.query)
    }

    /// Whether a load is running.
    pub async fn is_busy(&self) -> Result<bool, RuntimeError> {
        Ok(self.status().await?.busy)
    }

    /// Visible expanded entry.
    pub async fn expanded_id(&self) -> Result<Option<JumpId>, RuntimeError> {
        Ok(self.status().await?.expanded_id)
    }

    /// Reads one record straight from the repository.
    pub async fn record(&self, id: JumpId) -> Result<Option<JumpRecord>, RuntimeError> {
        Ok(blocking(&self.repo, move |r| r.get_by_id(id)).await?)
    }

    /// Reads a jump type straight from the repository.
    pub async fn jump_type(&self, id: JumpTypeId) -> Result<Option<JumpType>, RuntimeError> {
        Ok(blocking(&self.repo, move |r| r.get_jump_type(id)).await?)
    }

    /// Stops the runtime loop. In-flight hydration results are dropped.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

struct Writer {
    state: JumpListState,
    repo: Arc<dyn JumpRepository>,
    events_tx: broadcast::Sender<JumpEvent>,
    load_tx: mpsc::UnboundedSender<LoadFinished>,
    hydration_tx: mpsc::UnboundedSender<HydrationResult>,
    hydration_limit: Option<Arc<Semaphore>>,
    reload_pending: bool,
}

impl Writer {
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Load { resp } => {
                if self.state.is_busy() {
                    debug!("load already in progress; skipping");
                    let _ = resp.send(Ok(LoadOutcome::Skipped));
                } else {
                    self.start_load(Some(resp));
                }
            }
            Command::SetQuery { query, resp } => {
                let counts = self.state.set_query(&query);
                self.emit(JumpEvent::FilterChanged { query, counts });
                let _ = resp.send(counts);
            }
            Command::ToggleExpand { id, resp } => {
                let change = self.state.toggle_expand(id);
                if let Some(change) = &change {
                    for id in change.collapsed.iter().chain(change.expanded.iter()) {
                        self.emit(JumpEvent::EntryChanged {
                            id: *id,
                            fields: vec![EntryField::IsExpanded],
                        });
                    }
                }
                let _ = resp.send(change);
            }
            Command::CheckNumber {
                number,
                exclude,
                resp,
            } => {
                let _ = resp.send(self.state.find_conflict(number, exclude));
            }
            Command::NextNumber { resp } => {
                let _ = resp.send(self.state.next_jump_number());
            }
            Command::Save {
                record,
                policy,
                resp,
            } => {
                let out = self.save(record, policy).await;
                let _ = resp.send(out);
            }
            Command::Delete { id, resp } => {
                let out = self.delete(id).await;
                let _ = resp.send(out);
            }
            Command::FullSet { resp } => {
                let _ = resp.send(self.state.entries().to_vec());
            }
            Command::Filtered { resp } => {
                let _ = resp.send(self.state.filtered_entries().into_iter().cloned().collect());
            }
            Command::Entry { id, resp } => {
                let _ = resp.send(self.state.get(id).cloned());
            }
            Command::Status { resp } => {
                let _ = resp.send(ListStatus {
                    counts: self.state.counts(),
                    query: self.state.query().raw().to_string(),
                    busy: self.state.is_busy(),
                    expanded_id: self.state.expanded_id(),
                    generation: self.state.generation(),
                    pending_hydrations: self.state.pending_hydrations(),
                });
            }
            Command::Shutdown { resp } => {
                let _ = resp.send(());
                return true;
            }
        }

        false
    }

    fn start_load(&mut self, resp: Option<oneshot::Sender<Result<LoadOutcome, RuntimeError>>>) {
        if !self.state.try_begin_load() {
            return;
        }
        info!("loading jumps");
        self.emit(JumpEvent::BusyChanged { busy: true });

        let repo = Arc::clone(&self.repo);
        let tx = self.load_tx.clone();
        tokio::spawn(async move {
            let result = blocking(&repo, |r| r.get_all()).await;
            let _ = tx.send(LoadFinished { result, resp });
        });
    }

    fn finish_load(&mut self, done: LoadFinished) {
        self.state.end_load();

        let LoadFinished { result, resp } = done;
        let out = match result {
            Ok(records) => {
                let jobs = self.state.replace_all(records);
                let generation = self.state.generation();
                let counts = self.state.counts();
                info!(generation, total = counts.total, "jumps loaded");

                self.emit(JumpEvent::Loaded { generation, counts });
                self.emit(JumpEvent::FilterChanged {
                    query: self.state.query().raw().to_string(),
                    counts,
                });
                self.emit(JumpEvent::BusyChanged { busy: false });

                if jobs.is_empty() {
                    self.emit(JumpEvent::HydrationFinished { generation });
                } else {
                    self.hydrate(jobs);
                }
                Ok(LoadOutcome::Loaded { generation, counts })
            }
            Err(err) => {
                warn!(%err, "loading jumps failed; keeping previous list");
                self.emit(JumpEvent::LoadFailed {
                    message: err.to_string(),
                });
                self.emit(JumpEvent::BusyChanged { busy: false });
                Err(RuntimeError::from(err))
            }
        };

        if let Some(resp) = resp {
            let _ = resp.send(out);
        }

        if std::mem::take(&mut self.reload_pending) {
            debug!("store changed during load; reloading");
            self.start_load(None);
        }
    }

    fn apply_hydration(&mut self, result: HydrationResult) {
        let HydrationResult {
            job,
            hydration,
            error,
        } = result;
        let current = job.generation == self.state.generation();
        let outcome = self.state.apply_hydration(&job, hydration);

        if let (Some(err), true) = (error, current) {
            self.emit(JumpEvent::HydrationFailed {
                id: job.id,
                message: err.to_string(),
            });
        }
        if outcome.applied {
            self.emit(JumpEvent::EntryChanged {
                id: job.id,
                fields: HYDRATED_FIELDS.to_vec(),
            });
        }
        if outcome.filter_changed {
            self.emit(JumpEvent::FilterChanged {
                query: self.state.query().raw().to_string(),
                counts: self.state.counts(),
            });
        }
        if outcome.finished {
            self.emit(JumpEvent::HydrationFinished {
                generation: job.generation,
            });
        }
    }

    async fn save(&mut self, record: JumpRecord, policy: ShiftPolicy) -> Result<JumpId, RuntimeError> {
        let conflict = record
            .jump_number
            .and_then(|n| self.state.find_conflict(n, record.id));

        let report = save_with_resolution(&self.repo, conflict, record.clone(), policy).await;

        let mut shifted = 0;
        if let Some(shift) = report.shift {
            shifted = self.state.apply_shift(shift.threshold, shift.exclude);
            self.note_store_change();
        }

        let id = match report.result {
            Ok(id) => id,
            Err(err) => {
                if shifted > 0 {
                    self.emit(JumpEvent::FilterChanged {
                        query: self.state.query().raw().to_string(),
                        counts: self.state.counts(),
                    });
                }
                return Err(err.into());
            }
        };
        let mut saved = record;
        saved.id = Some(id);
        if let Some(job) = self.state.upsert_record(saved) {
            self.hydrate(vec![job]);
        }
        self.note_store_change();

        self.emit(JumpEvent::Saved { id, shifted });
        self.emit(JumpEvent::FilterChanged {
            query: self.state.query().raw().to_string(),
            counts: self.state.counts(),
        });
        Ok(id)
    }

    async fn delete(&mut self, id: JumpId) -> Result<bool, RuntimeError> {
        let removed = blocking(&self.repo, move |r| r.delete(id)).await? > 0;
        if self.state.remove(id) {
            self.emit(JumpEvent::FilterChanged {
                query: self.state.query().raw().to_string(),
                counts: self.state.counts(),
            });
        }
        if removed {
            self.note_store_change();
            self.emit(JumpEvent::Deleted { id });
        }
        Ok(removed)
    }

    fn hydrate(&self, jobs: Vec<HydrationJob>) {
        spawn_hydration_batch(&self.repo, jobs, self.hydration_limit.clone(), &self.hydration_tx);
    }

    fn note_store_change(&mut self) {
        if self.state.is_busy() {
            self.reload_pending = true;
        }
    }

    fn emit(&self, event: JumpEvent) {
        let _ = self.events_tx.send(event);
    }
}
