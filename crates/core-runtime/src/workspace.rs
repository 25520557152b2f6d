use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_attention::AttentionMonitor;
use core_bus::MessageBus;
use core_engine::{CheckpointService, EscalationService, PortEngine, RulesActivator, SessionEngine};
use core_store::Database;
use core_types::{
    BudgetStatus, Checkpoint, Escalation, EscalationStatus, EscalationSummary, Lock, Message,
    NewCheckpoint, NewMessage, Pipeline, PipelineProgress, PipelineStatus, Port, PortStatus,
    PortSummary, RecoveryContext, Session, SessionEvent, SessionStatus, StartSessionOptions,
};
use tracing::warn;

use crate::config::Config;
use crate::error::{Error, Result};

const DB_FILE: &str = "state.db";
const RULES_DIR: &str = "rules";

/// Owns the Store handle and exposes every component behind one API.
///
/// Every lower-layer component (`core-store`/`core-engine`/`core-bus`/
/// `core-attention`) is synchronous; `Workspace` runs each call on the
/// blocking thread pool so callers built on `tokio` never park a worker
/// thread on a database write (§5's "callers reach the engine through
/// tokio async methods").
#[derive(Clone)]
pub struct Workspace {
    inner: Arc<Inner>,
}

struct Inner {
    db: Database,
    rules: RulesActivator,
    config: Config,
    data_dir: PathBuf,
}

impl Workspace {
    /// Open (or create) the `.port` data directory for `project_root` and
    /// wire every component against it.
    pub fn open(project_root: &Path) -> Result<Self> {
        let data_dir = project_root.join(".port");
        std::fs::create_dir_all(&data_dir)?;

        let db = Database::open(&data_dir.join(DB_FILE)).map_err(core_engine_store_err)?;
        let rules = RulesActivator::new(data_dir.join(RULES_DIR));
        let config = Config::load_from(&data_dir.join("config.toml"))?;

        Ok(Self {
            inner: Arc::new(Inner { db, rules, config, data_dir }),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Release every lock whose holder session is no longer `running`.
    /// Meant to run once at process startup (§5: "operationally resolved
    /// by a startup sweep").
    pub async fn sweep_crashed_locks(&self) -> Result<u64> {
        let inner = self.inner.clone();
        run_blocking(move || {
            let locks = inner.db.list_locks().map_err(core_engine_store_err)?;
            let mut released = 0u64;
            for lock in locks {
                let holder_alive = inner
                    .db
                    .get_session(&lock.session_id)
                    .map_err(core_engine_store_err)?
                    .map(|s| s.status == SessionStatus::Running)
                    .unwrap_or(false);
                if !holder_alive {
                    inner
                        .db
                        .release_lock(&lock.resource, &lock.session_id)
                        .map_err(core_engine_store_err)?;
                    released += 1;
                }
            }
            Ok(released)
        })
        .await
        .inspect(|released| {
            if *released > 0 {
                warn!(released, "swept stale locks from crashed sessions");
            }
        })
    }

    // -- sessions -----------------------------------------------------------

    pub async fn start_session(&self, opts: StartSessionOptions) -> Result<Session> {
        let inner = self.inner.clone();
        run_blocking(move || SessionEngine::new(&inner.db).start_hierarchical(opts)).await
    }

    pub async fn get_session(&self, id: String) -> Result<Session> {
        let inner = self.inner.clone();
        run_blocking(move || SessionEngine::new(&inner.db).get(&id)).await
    }

    pub async fn end_session(&self, id: String, status: SessionStatus, reason: String) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || SessionEngine::new(&inner.db).end(&id, status, &reason)).await
    }

    pub async fn session_tree(&self, root_id: String) -> Result<Vec<Session>> {
        let inner = self.inner.clone();
        run_blocking(move || SessionEngine::new(&inner.db).tree(&root_id)).await
    }

    pub async fn session_children(&self, id: String) -> Result<Vec<Session>> {
        let inner = self.inner.clone();
        run_blocking(move || SessionEngine::new(&inner.db).children(&id)).await
    }

    pub async fn list_sessions(
        &self,
        project_root: Option<String>,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>> {
        let inner = self.inner.clone();
        run_blocking(move || {
            inner
                .db
                .list_sessions(project_root.as_deref(), status)
                .map_err(core_engine_store_err)
        })
        .await
    }

    /// Compact a session to `after_tokens` (the caller-computed post-compaction
    /// token count) and return the updated session.
    pub async fn compact_session(
        &self,
        id: String,
        trigger: String,
        preserved: Vec<String>,
        after_tokens: i64,
    ) -> Result<Session> {
        let inner = self.inner.clone();
        run_blocking(move || {
            let engine = SessionEngine::new(&inner.db);
            engine.compact(&id, &trigger, &preserved, after_tokens)?;
            engine.get(&id)
        })
        .await
    }

    pub async fn session_events(
        &self,
        id: String,
        filter_type: Option<String>,
        limit: usize,
    ) -> Result<Vec<SessionEvent>> {
        let inner = self.inner.clone();
        run_blocking(move || {
            SessionEngine::new(&inner.db).get_events(&id, filter_type.as_deref(), limit)
        })
        .await
    }

    // -- ports ----------------------------------------------------------

    pub async fn create_port(
        &self,
        pipeline_id: Option<String>,
        title: String,
        spec_file: Option<String>,
        depends_on: Vec<String>,
    ) -> Result<Port> {
        let inner = self.inner.clone();
        run_blocking(move || {
            PortEngine::new(&inner.db, &inner.rules).create(None, &title, spec_file, pipeline_id, &depends_on)
        })
        .await
    }

    pub async fn get_port(&self, id: String) -> Result<Port> {
        let inner = self.inner.clone();
        run_blocking(move || PortEngine::new(&inner.db, &inner.rules).get(&id)).await
    }

    pub async fn list_ports(
        &self,
        pipeline_id: Option<String>,
        status: Option<PortStatus>,
    ) -> Result<Vec<Port>> {
        let inner = self.inner.clone();
        run_blocking(move || {
            PortEngine::new(&inner.db, &inner.rules).list(pipeline_id.as_deref(), status)
        })
        .await
    }

    /// Transition a port's status. Leaving `running` additionally takes a
    /// mandatory checkpoint for the linked session (§4.7: "a checkpoint is
    /// also taken ... at every `port-end`").
    pub async fn update_port_status(
        &self,
        id: String,
        status: PortStatus,
        session_id: Option<String>,
    ) -> Result<Port> {
        let inner = self.inner.clone();
        run_blocking(move || {
            let engine = PortEngine::new(&inner.db, &inner.rules);
            let before = engine.get(&id)?;
            let port = engine.update_status(&id, status, session_id.as_deref())?;

            if before.status == PortStatus::Running && port.status != PortStatus::Running {
                if let Some(linked_session_id) = port.linked_session_id.clone() {
                    AttentionMonitor::with_event_horizon(&inner.db, inner.config.checkpoint_event_horizon as usize)
                        .checkpoint_now(&NewCheckpoint {
                            session_id: linked_session_id,
                            port_id: Some(port.id.clone()),
                            summary: format!("port '{}' ended ({})", port.title, port.status.as_str()),
                            active_files: port.file.clone().into_iter().collect(),
                            key_points: vec![],
                        })?;
                }
            }

            Ok(port)
        })
        .await
    }

    pub async fn delete_port(&self, id: String) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || PortEngine::new(&inner.db, &inner.rules).delete(&id)).await
    }

    pub async fn port_summary(&self, pipeline_id: Option<String>) -> Result<PortSummary> {
        let inner = self.inner.clone();
        run_blocking(move || PortEngine::new(&inner.db, &inner.rules).summary(pipeline_id.as_deref())).await
    }

    // -- pipelines --------------------------------------------------------

    pub async fn create_pipeline(&self, id: Option<String>, name: String) -> Result<Pipeline> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.create_pipeline(id, &name).map_err(core_engine_store_err)).await
    }

    pub async fn get_pipeline(&self, id: String) -> Result<Option<Pipeline>> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.get_pipeline(&id).map_err(core_engine_store_err)).await
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.list_pipelines().map_err(core_engine_store_err)).await
    }

    pub async fn update_pipeline_status(&self, id: String, status: PipelineStatus) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.update_pipeline_status(&id, status).map_err(core_engine_store_err))
            .await
    }

    pub async fn pipeline_progress(&self, id: String) -> Result<Option<PipelineProgress>> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.pipeline_progress(&id).map_err(core_engine_store_err)).await
    }

    // -- locks --------------------------------------------------------------

    pub async fn acquire_lock(&self, resource: String, session_id: String) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || {
            if let Some(holder) = inner.db.lock_holder(&resource).map_err(core_engine_store_err)? {
                if holder != session_id {
                    return Err(core_types::DomainError::new(
                        core_types::DomainErrorKind::Held,
                        format!("resource '{resource}' is held by session '{holder}'"),
                    ));
                }
                return Ok(());
            }
            inner
                .db
                .acquire_lock(&resource, &session_id)
                .map_err(core_engine_store_err)
        })
        .await
    }

    pub async fn release_lock(&self, resource: String, session_id: String) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || {
            inner
                .db
                .release_lock(&resource, &session_id)
                .map_err(core_engine_store_err)
        })
        .await
    }

    pub async fn list_locks(&self) -> Result<Vec<Lock>> {
        let inner = self.inner.clone();
        run_blocking(move || inner.db.list_locks().map_err(core_engine_store_err)).await
    }

    // -- messages ---------------------------------------------------------

    pub async fn send_message(&self, new: NewMessage) -> Result<Message> {
        let inner = self.inner.clone();
        run_blocking(move || MessageBus::new(&inner.db).send(new)).await
    }

    pub async fn receive_messages(&self, session_id: String, limit: Option<i64>) -> Result<Vec<Message>> {
        let inner = self.inner.clone();
        run_blocking(move || MessageBus::new(&inner.db).receive(&session_id, limit)).await
    }

    pub async fn mark_message_processed(&self, id: String) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || MessageBus::new(&inner.db).mark_processed(&id)).await
    }

    pub async fn sweep_expired_messages(&self) -> Result<u64> {
        let inner = self.inner.clone();
        let Some(horizon) = inner.config.message_expiry_secs else {
            return Ok(0);
        };
        run_blocking(move || MessageBus::new(&inner.db).sweep_expired(horizon)).await
    }

    // -- escalations --------------------------------------------------------

    pub async fn open_escalation(&self, session_id: Option<String>, issue: String) -> Result<Escalation> {
        let inner = self.inner.clone();
        run_blocking(move || EscalationService::new(&inner.db).open(session_id.as_deref(), &issue)).await
    }

    pub async fn resolve_escalation(&self, id: i64) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || EscalationService::new(&inner.db).resolve(id)).await
    }

    pub async fn dismiss_escalation(&self, id: i64) -> Result<()> {
        let inner = self.inner.clone();
        run_blocking(move || EscalationService::new(&inner.db).dismiss(id)).await
    }

    pub async fn list_escalations(&self, status: Option<EscalationStatus>) -> Result<Vec<Escalation>> {
        let inner = self.inner.clone();
        run_blocking(move || EscalationService::new(&inner.db).list(status)).await
    }

    pub async fn escalation_summary(&self) -> Result<EscalationSummary> {
        let inner = self.inner.clone();
        run_blocking(move || EscalationService::new(&inner.db).summary()).await
    }

    // -- checkpoints & attention --------------------------------------------

    pub async fn create_checkpoint(&self, new: NewCheckpoint) -> Result<Checkpoint> {
        let inner = self.inner.clone();
        run_blocking(move || CheckpointService::new(&inner.db).create(&new)).await
    }

    pub async fn recovery_context(&self, session_id: String) -> Result<RecoveryContext> {
        let inner = self.inner.clone();
        run_blocking(move || CheckpointService::new(&inner.db).generate_recovery_context(&session_id))
            .await
    }

    pub async fn recovery_prompt(&self, session_id: String) -> Result<String> {
        let ctx = self.recovery_context(session_id).await?;
        Ok(core_engine::render_recovery_prompt(&ctx))
    }

    pub async fn record_usage(
        &self,
        session_id: String,
        tokens_used: i64,
        cost_delta: f64,
    ) -> Result<BudgetStatus> {
        let inner = self.inner.clone();
        run_blocking(move || AttentionMonitor::new(&inner.db).record_usage(&session_id, tokens_used, cost_delta))
            .await
    }

    /// Scan an agent transcript file (§4.7/C3) and feed its aggregated token
    /// usage and cost into the attention monitor for `session_id`.
    pub async fn sync_usage_from_transcript(
        &self,
        session_id: String,
        transcript_path: PathBuf,
    ) -> Result<BudgetStatus> {
        let report = core_transcript::scan_usage(&transcript_path)?;
        let tokens_used = report.usage.total() as i64;
        let inner = self.inner.clone();
        run_blocking(move || AttentionMonitor::new(&inner.db).record_usage(&session_id, tokens_used, report.cost)).await
    }

    pub async fn checkpoint_if_due(&self, new: NewCheckpoint) -> Result<Option<Checkpoint>> {
        let inner = self.inner.clone();
        run_blocking(move || {
            AttentionMonitor::with_event_horizon(&inner.db, inner.config.checkpoint_event_horizon as usize)
                .checkpoint_if_due(&new)
        })
        .await
    }

    /// Take a checkpoint unconditionally, for an explicit caller request.
    pub async fn checkpoint_now(&self, new: NewCheckpoint) -> Result<Checkpoint> {
        let inner = self.inner.clone();
        run_blocking(move || AttentionMonitor::new(&inner.db).checkpoint_now(&new)).await
    }

    /// Pure, non-blocking — exposed as sync since it touches no I/O.
    pub fn detect_compact(&self, text: &str) -> bool {
        AttentionMonitor::new(&self.inner.db).detect_compact(text)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> core_types::DomainResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| Error::InvalidOperation(format!("background task panicked: {err}")))?
        .map_err(Error::from)
}

fn core_engine_store_err(err: core_store::Error) -> core_types::DomainError {
    core_engine::store_err(err)
}
