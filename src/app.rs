use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::widgets::{ListState, TableState};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::advisor;
use crate::batch::BatchActionResult;
use crate::browser::{BatchRequest, LoadTicket, MessageBrowser};
use crate::client::models::{QueueMessage, QueueSummary};
use crate::client::{self, BrokerClient, JolokiaClient};
use crate::config::{AppConfig, AppSettings, ConnectionProfile};
use crate::directory::{self, QueueDirectory, RefreshTicket};
use crate::error::{ConsoleError, ConsoleResult};
use crate::session::{Epoch, Session};

/// How many trailing lines of the log file the log viewer shows.
pub const LOG_TAIL_LINES: usize = 1000;

/// Events sent from background tasks back to the main loop.
pub enum BgEvent {
    QueuesRefreshed {
        ticket: RefreshTicket,
        result: client::Result<Vec<QueueSummary>>,
    },
    MessagesLoaded {
        ticket: LoadTicket,
        result: client::Result<Vec<QueueMessage>>,
    },
    BatchProgress {
        done: usize,
        total: usize,
    },
    BatchComplete {
        epoch: Epoch,
        queue: String,
        /// `None` for a delete.
        target: Option<String>,
        result: ConsoleResult<BatchActionResult>,
    },
}

/// Broker work requested by input handling, started by `dispatch_pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    RefreshQueues,
    LoadMessages(String),
    /// Reload after the queue changed, superseding a load already running.
    ReloadMessages(String),
    Delete,
    Move { target: String },
}

/// Which panel is currently focused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPanel {
    Queues,
    Messages,
}

/// Active modal overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveModal {
    None,
    ConnectionList,
    /// `editing` holds the name of the profile being edited, `None` for a new one.
    ConnectionForm { editing: Option<String> },
    MoveTarget { count: usize },
    ConfirmDelete { count: usize },
    MessageDetail,
    Logs,
    Help,
}

/// Outcome of the last finished batch, kept on screen until the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub summary: String,
    pub failed: bool,
}

const FORM_NAME: usize = 0;
const FORM_HOST: usize = 1;
const FORM_PORT: usize = 2;
const FORM_USER: usize = 3;
const FORM_PASSWORD: usize = 4;
const FORM_TLS: usize = 5;
const FORM_CONTEXT_PATH: usize = 6;
const FORM_BROKER_NAME: usize = 7;

/// Central application state.
pub struct App {
    pub running: bool,
    pub config: AppConfig,
    config_path: PathBuf,
    pub log_path: PathBuf,

    pub session: Session,
    pub directory: QueueDirectory,
    pub browser: MessageBrowser,

    // Queue panel
    pub queue_filter: String,
    pub queue_selected: usize,
    pub queue_table_state: TableState,

    // Message panel
    pub message_selected: usize,
    pub message_table_state: TableState,
    pub detail_scroll: u16,

    // UI state
    pub focus: FocusPanel,
    pub modal: ActiveModal,
    pub filter_editing: bool,
    pub status_message: String,
    pub status_is_error: bool,

    // Connection list / form
    pub connection_selected: usize,
    pub connection_list_state: ListState,
    pub input_fields: Vec<(String, String)>, // (label, value)
    pub input_field_index: usize,
    pub form_cursor: usize, // byte offset within the active form field

    // Move target picker
    pub input_buffer: String,
    pub move_suggestions: Vec<String>,
    pub suggestion_index: Option<usize>,

    // Log viewer
    pub log_lines: Vec<String>,
    pub log_scroll: usize,

    // Background task channel
    pub bg_tx: mpsc::UnboundedSender<BgEvent>,
    pub bg_rx: mpsc::UnboundedReceiver<BgEvent>,
    pub batch_running: bool,
    pub last_batch: Option<BatchReport>,
    pending: Vec<Action>,
    last_refresh: Instant,
}

/// Build the broker client for `profile`.
pub fn connect(
    profile: &ConnectionProfile,
    settings: &AppSettings,
) -> client::Result<Arc<dyn BrokerClient>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    Ok(Arc::new(JolokiaClient::new(profile, timeout)?))
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let session = Session::start(&config, |profile| connect(profile, &config.settings));
        Self::with_session(config, session, AppConfig::config_path(), AppConfig::log_path())
    }

    pub fn with_session(
        config: AppConfig,
        session: Session,
        config_path: PathBuf,
        log_path: PathBuf,
    ) -> Self {
        let (bg_tx, bg_rx) = mpsc::unbounded_channel();
        let mut app = Self {
            running: true,
            config,
            config_path,
            log_path,
            session,
            directory: QueueDirectory::new(),
            browser: MessageBrowser::new(),
            queue_filter: String::new(),
            queue_selected: 0,
            queue_table_state: TableState::default(),
            message_selected: 0,
            message_table_state: TableState::default(),
            detail_scroll: 0,
            focus: FocusPanel::Queues,
            modal: ActiveModal::None,
            filter_editing: false,
            status_message: String::new(),
            status_is_error: false,
            connection_selected: 0,
            connection_list_state: ListState::default(),
            input_fields: Vec::new(),
            input_field_index: 0,
            form_cursor: 0,
            input_buffer: String::new(),
            move_suggestions: Vec::new(),
            suggestion_index: None,
            log_lines: Vec::new(),
            log_scroll: 0,
            bg_tx,
            bg_rx,
            batch_running: false,
            last_batch: None,
            pending: Vec::new(),
            last_refresh: Instant::now(),
        };
        match app.session.active().map(|p| p.name.clone()) {
            Some(name) => {
                app.set_status(format!("Connected to '{}'. Press '?' for help", name));
                app.request(Action::RefreshQueues);
            }
            None => {
                app.set_status("No active connection. Select or add one");
                app.open_connection_list();
            }
        }
        app
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = false;
    }

    pub fn set_error(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
        self.status_is_error = true;
    }

    /// Show a failed operation in the status bar. Stale responses are dropped quietly.
    pub fn report(&mut self, err: ConsoleError) {
        match err {
            ConsoleError::Stale => debug!("Ignored a stale response"),
            other => self.set_error(other.to_string()),
        }
    }

    /// Queue `action` for the next dispatch, once.
    pub fn request(&mut self, action: Action) {
        if !self.pending.contains(&action) {
            self.pending.push(action);
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> &[Action] {
        &self.pending
    }

    // ────────── Views ──────────

    pub fn visible_queues(&self) -> Vec<&QueueSummary> {
        directory::filter(self.directory.snapshot(&self.session), &self.queue_filter)
    }

    pub fn selected_queue_name(&self) -> Option<String> {
        self.visible_queues()
            .get(self.queue_selected)
            .map(|q| q.name.clone())
    }

    pub fn visible_messages(&self) -> Vec<&QueueMessage> {
        self.browser.visible(&self.session)
    }

    pub fn current_message(&self) -> Option<&QueueMessage> {
        self.visible_messages().get(self.message_selected).copied()
    }

    /// Keep the cursors inside the visible rows after data or filters change.
    pub fn clamp_cursors(&mut self) {
        let queues = self.visible_queues().len();
        self.queue_selected = self.queue_selected.min(queues.saturating_sub(1));
        let messages = self.visible_messages().len();
        self.message_selected = self.message_selected.min(messages.saturating_sub(1));
    }

    // ────────── Connections ──────────

    pub fn open_connection_list(&mut self) {
        let active = self.session.active().map(|p| p.name.clone());
        self.connection_selected = active
            .and_then(|name| self.config.connections.iter().position(|c| c.name == name))
            .unwrap_or(0);
        self.modal = ActiveModal::ConnectionList;
    }

    pub fn selected_connection_name(&self) -> Option<String> {
        self.config
            .connections
            .get(self.connection_selected)
            .map(|c| c.name.clone())
    }

    /// Make the stored profile `name` the active connection.
    pub fn switch_connection(&mut self, name: &str) {
        let Some(profile) = self.config.get(name).cloned() else {
            self.set_error(format!("Unknown connection '{}'", name));
            return;
        };
        match connect(&profile, &self.config.settings) {
            Ok(client) => self.activate(profile, client),
            Err(e) => {
                warn!("Could not connect to '{}': {}", name, e);
                self.set_error(format!("Could not connect to '{}': {}", name, e));
            }
        }
    }

    /// Switch to `profile` over `client`, dropping every cached listing.
    pub fn activate(&mut self, profile: ConnectionProfile, client: Arc<dyn BrokerClient>) {
        let label = format!("Connected to '{}' ({})", profile.name, profile.address());
        self.session.switch_to(profile, client);
        self.directory.invalidate();
        self.browser.invalidate();
        self.queue_filter.clear();
        self.queue_selected = 0;
        self.message_selected = 0;
        self.focus = FocusPanel::Queues;
        self.modal = ActiveModal::None;
        self.pending.clear();
        self.batch_running = false;
        self.last_batch = None;
        self.last_refresh = Instant::now();
        self.set_status(label);
        self.request(Action::RefreshQueues);
    }

    pub fn open_connection_form(&mut self, editing: Option<String>) {
        let profile = editing
            .as_deref()
            .and_then(|name| self.config.get(name))
            .cloned()
            .unwrap_or_else(|| ConnectionProfile {
                name: String::new(),
                ..ConnectionProfile::default()
            });
        self.input_fields = vec![
            ("Name".to_string(), profile.name),
            ("Host".to_string(), profile.host),
            ("Port".to_string(), profile.port.to_string()),
            ("User".to_string(), profile.user),
            ("Password".to_string(), profile.password),
            ("Use TLS (true/false)".to_string(), profile.use_tls.to_string()),
            ("Context Path".to_string(), profile.context_path),
            ("Broker Name".to_string(), profile.broker_name),
        ];
        self.input_field_index = FORM_NAME;
        self.form_cursor = self.input_fields[FORM_NAME].1.len();
        self.modal = ActiveModal::ConnectionForm { editing };
    }

    /// Build a profile from the connection form, or explain what is wrong with it.
    pub fn profile_from_form(&self) -> Result<ConnectionProfile, String> {
        let get = |idx: usize| -> String {
            self.input_fields
                .get(idx)
                .map(|(_, v)| v.trim().to_string())
                .unwrap_or_default()
        };

        let name = get(FORM_NAME);
        if name.is_empty() {
            return Err("Name is required".into());
        }
        let host = get(FORM_HOST);
        if host.is_empty() {
            return Err("Host is required".into());
        }
        let port: u16 = get(FORM_PORT)
            .parse()
            .map_err(|_| format!("Invalid port '{}'", get(FORM_PORT)))?;
        let use_tls = match get(FORM_TLS).to_lowercase().as_str() {
            "" | "false" | "no" | "n" => false,
            "true" | "yes" | "y" => true,
            other => return Err(format!("Use TLS must be true or false, got '{}'", other)),
        };
        let defaults = ConnectionProfile::default();
        let context_path = Some(get(FORM_CONTEXT_PATH))
            .filter(|p| !p.is_empty())
            .unwrap_or(defaults.context_path);
        let broker_name = Some(get(FORM_BROKER_NAME))
            .filter(|b| !b.is_empty())
            .unwrap_or(defaults.broker_name);

        Ok(ConnectionProfile {
            name,
            host,
            port,
            user: get(FORM_USER),
            password: self
                .input_fields
                .get(FORM_PASSWORD)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            use_tls,
            is_default: false,
            context_path,
            broker_name,
        })
    }

    pub fn submit_connection_form(&mut self) {
        let ActiveModal::ConnectionForm { editing } = self.modal.clone() else {
            return;
        };
        let mut profile = match self.profile_from_form() {
            Ok(p) => p,
            Err(msg) => {
                self.set_error(msg);
                return;
            }
        };
        profile.is_default = match editing.as_deref().and_then(|n| self.config.get(n)) {
            Some(existing) => existing.is_default,
            None => self.config.connections.is_empty(),
        };
        let name = profile.name.clone();
        let active = self.session.active().map(|p| p.name.clone());
        let reconnect = editing.is_some() && editing == active;
        match editing {
            Some(old) => {
                self.config.update_connection(&old, profile);
            }
            None => self.config.add_connection(profile),
        }
        info!("Saved connection '{}'", name);
        self.modal = ActiveModal::ConnectionList;
        self.connection_selected = self
            .config
            .connections
            .iter()
            .position(|c| c.name == name)
            .unwrap_or(0);
        self.set_status(format!("Saved connection '{}'", name));
        self.save_config();
        if reconnect {
            // The session still holds a client built from the old settings.
            self.switch_connection(&name);
        }
    }

    pub fn delete_selected_connection(&mut self) {
        let Some(name) = self.selected_connection_name() else {
            return;
        };
        self.config.delete_connection(&name);
        self.connection_selected = self
            .connection_selected
            .min(self.config.connections.len().saturating_sub(1));
        if self.session.active().map(|p| p.name.as_str()) == Some(name.as_str()) {
            self.set_status(format!(
                "Deleted connection '{}'; the current session stays open until you switch",
                name
            ));
        } else {
            self.set_status(format!("Deleted connection '{}'", name));
        }
        self.save_config();
    }

    pub fn set_selected_default(&mut self) {
        let Some(name) = self.selected_connection_name() else {
            return;
        };
        if self.config.set_default(&name) {
            self.set_status(format!("'{}' is now the default connection", name));
            self.save_config();
        }
    }

    fn save_config(&mut self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!("Failed to save config: {}", e);
            self.set_error(format!("Failed to save config: {}", e));
        }
    }

    // ────────── Queue & message actions ──────────

    pub fn open_selected_queue(&mut self) {
        match self.selected_queue_name() {
            Some(name) => {
                self.request(Action::LoadMessages(name));
                self.focus = FocusPanel::Messages;
            }
            None => self.set_status("No queue selected"),
        }
    }

    pub fn reload_messages(&mut self) {
        match self.browser.queue().map(str::to_string) {
            Some(queue) => self.request(Action::LoadMessages(queue)),
            None => self.set_status("Open a queue first"),
        }
    }

    pub fn toggle_current(&mut self) {
        let Some(id) = self.current_message().map(|m| m.id.clone()) else {
            return;
        };
        self.browser.toggle(&id);
        let n = self.browser.selection().len();
        self.set_status(format!("{} selected", n));
    }

    pub fn select_all_visible(&mut self) {
        let n = self.browser.select_all_visible(&self.session);
        self.set_status(format!("{} selected", n));
    }

    pub fn clear_selection(&mut self) {
        self.browser.clear_selection();
        self.set_status("Selection cleared");
    }

    /// The selection, or the highlighted message when nothing is selected.
    fn batch_request(&self) -> ConsoleResult<Option<BatchRequest>> {
        let current = self.current_message().map(|m| m.id.as_str());
        self.browser.batch_request(&self.session, current)
    }

    /// Number of messages a move or delete would act on, reporting why not
    /// when there are none.
    fn action_count(&mut self) -> Option<usize> {
        if self.batch_running {
            self.set_status("A batch action is in progress...");
            return None;
        }
        match self.batch_request() {
            Ok(Some(request)) => Some(request.ids.len()),
            Ok(None) => {
                self.set_status("No message selected");
                None
            }
            Err(e) => {
                self.report(e);
                None
            }
        }
    }

    pub fn open_move_modal(&mut self) {
        if let Some(count) = self.action_count() {
            self.input_buffer.clear();
            self.update_suggestions();
            self.modal = ActiveModal::MoveTarget { count };
        }
    }

    pub fn open_confirm_delete(&mut self) {
        if let Some(count) = self.action_count() {
            self.modal = ActiveModal::ConfirmDelete { count };
        }
    }

    /// Recompute move targets for the typed text.
    pub fn update_suggestions(&mut self) {
        let source = self.browser.queue().unwrap_or_default();
        self.move_suggestions = advisor::suggest(
            self.directory.snapshot(&self.session),
            source,
            self.input_buffer.trim(),
        );
        self.suggestion_index = None;
    }

    /// The highlighted suggestion, else the typed queue name.
    pub fn move_target(&self) -> Option<String> {
        self.suggestion_index
            .and_then(|i| self.move_suggestions.get(i).cloned())
            .or_else(|| {
                let typed = self.input_buffer.trim();
                (!typed.is_empty()).then(|| typed.to_string())
            })
    }

    pub fn confirm_move(&mut self) {
        let Some(target) = self.move_target() else {
            self.set_error("Enter a target queue");
            return;
        };
        if let Some(source) = self.browser.queue() {
            if source == target {
                let queue = source.to_string();
                self.report(ConsoleError::InvalidTarget { queue });
                return;
            }
        }
        self.modal = ActiveModal::None;
        self.request(Action::Move { target });
    }

    pub fn confirm_delete(&mut self) {
        self.modal = ActiveModal::None;
        self.request(Action::Delete);
    }

    pub fn open_logs(&mut self) {
        self.log_lines = match read_log_tail(&self.log_path, LOG_TAIL_LINES) {
            Ok(lines) => lines,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                vec!["No log file found".to_string()]
            }
            Err(e) => vec![format!("Could not read {}: {}", self.log_path.display(), e)],
        };
        // Start at the tail; rendering clamps this to the last page.
        self.log_scroll = usize::MAX;
        self.modal = ActiveModal::Logs;
    }

    // ────────── Background work ──────────

    /// Queue an auto refresh when one is due and none is running.
    pub fn tick(&mut self, now: Instant) {
        let secs = self.config.settings.auto_refresh_secs;
        if secs == 0 || self.session.active().is_none() {
            return;
        }
        if now.duration_since(self.last_refresh) < Duration::from_secs(secs) {
            return;
        }
        self.last_refresh = now;
        if self.directory.is_refreshing(&self.session) {
            debug!("Skipping auto refresh while a refresh is running");
            return;
        }
        self.request(Action::RefreshQueues);
    }

    /// Start every queued action on a background task.
    pub fn dispatch_pending(&mut self) {
        for action in std::mem::take(&mut self.pending) {
            if let Err(e) = self.dispatch(action) {
                self.report(e);
            }
        }
    }

    fn dispatch(&mut self, action: Action) -> ConsoleResult<()> {
        let tx = self.bg_tx.clone();
        match action {
            Action::RefreshQueues => {
                let (ticket, client) = self.directory.begin_refresh(&self.session)?;
                self.last_refresh = Instant::now();
                self.set_status("Refreshing queues...");
                tokio::spawn(async move {
                    let result = client.list_queues().await;
                    let _ = tx.send(BgEvent::QueuesRefreshed { ticket, result });
                });
            }
            Action::LoadMessages(queue) => {
                let (ticket, client) = self.browser.begin_load(&self.session, &queue)?;
                self.message_selected = 0;
                self.set_status(format!("Loading messages from '{}'...", queue));
                tokio::spawn(async move {
                    let result = client.browse_messages(ticket.queue()).await;
                    let _ = tx.send(BgEvent::MessagesLoaded { ticket, result });
                });
            }
            Action::ReloadMessages(queue) => {
                let (ticket, client) = self.browser.begin_reload(&self.session, &queue)?;
                tokio::spawn(async move {
                    let result = client.browse_messages(ticket.queue()).await;
                    let _ = tx.send(BgEvent::MessagesLoaded { ticket, result });
                });
            }
            Action::Delete => self.start_batch(None)?,
            Action::Move { target } => self.start_batch(Some(target))?,
        }
        Ok(())
    }

    fn start_batch(&mut self, target: Option<String>) -> ConsoleResult<()> {
        if self.batch_running {
            self.set_status("A batch action is in progress...");
            return Ok(());
        }
        let Some(request) = self.batch_request()? else {
            self.set_status("No message selected");
            return Ok(());
        };
        let epoch = self.session.epoch();
        let total = request.ids.len();
        let concurrency = self.config.settings.batch_concurrency;
        let tx = self.bg_tx.clone();
        self.batch_running = true;
        self.last_batch = None;
        self.set_status(match &target {
            Some(t) => format!("Moving {} message(s) to '{}'...", total, t),
            None => format!("Deleting {} message(s)...", total),
        });

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<usize>();
        let progress_fwd = tx.clone();
        tokio::spawn(async move {
            while let Some(done) = progress_rx.recv().await {
                let _ = progress_fwd.send(BgEvent::BatchProgress { done, total });
            }
        });

        tokio::spawn(async move {
            let queue = request.queue.clone();
            let result = match target.as_deref() {
                Some(t) => request.move_to(t, concurrency, Some(progress_tx)).await,
                None => Ok(request.delete(concurrency, Some(progress_tx)).await),
            };
            let _ = tx.send(BgEvent::BatchComplete {
                epoch,
                queue,
                target,
                result,
            });
        });
        Ok(())
    }

    /// Fold a background result into the app state.
    pub fn apply_bg_event(&mut self, event: BgEvent) {
        match event {
            BgEvent::QueuesRefreshed { ticket, result } => {
                match self
                    .directory
                    .complete_refresh(&self.session, ticket, result)
                    .map(|queues| queues.len())
                {
                    Ok(n) => {
                        self.clamp_cursors();
                        self.set_status(format!("Loaded {} queues", n));
                    }
                    Err(e) => self.report(e),
                }
            }
            BgEvent::MessagesLoaded { ticket, result } => {
                let queue = ticket.queue().to_string();
                match self
                    .browser
                    .complete_load(&self.session, ticket, result)
                    .map(|messages| messages.len())
                {
                    Ok(n) => {
                        self.clamp_cursors();
                        self.set_status(format!("Loaded {} messages from '{}'", n, queue));
                    }
                    Err(e) => {
                        self.clamp_cursors();
                        self.report(e);
                    }
                }
            }
            BgEvent::BatchProgress { done, total } => {
                if self.batch_running {
                    self.set_status(format!("Processed {}/{} message(s)...", done, total));
                }
            }
            BgEvent::BatchComplete {
                epoch,
                queue,
                target,
                result,
            } => {
                if !self.session.is_current(epoch) {
                    debug!("Ignoring batch result from a previous connection");
                    return;
                }
                self.batch_running = false;
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        self.report(e);
                        return;
                    }
                };
                let summary = match &target {
                    Some(t) => format!("{} to '{}'", outcome.summary("Moved"), t),
                    None => outcome.summary("Deleted"),
                };
                let failed = !outcome.failed.is_empty();
                if failed {
                    self.set_error(summary.clone());
                } else {
                    self.set_status(summary.clone());
                }
                self.last_batch = Some(BatchReport { summary, failed });
                if self.browser.queue() == Some(queue.as_str()) {
                    if let Some(queue) = self.browser.finish_batch() {
                        self.request(Action::ReloadMessages(queue));
                    }
                }
                if !self.directory.is_refreshing(&self.session) {
                    self.request(Action::RefreshQueues);
                }
            }
        }
    }
}

/// Last `max` lines of the file at `path`.
pub fn read_log_tail(path: &Path, max: usize) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(max);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::{message, FakeBroker};
    use tempfile::TempDir;

    fn fixture(fake: Arc<FakeBroker>) -> (App, TempDir) {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.add_connection(ConnectionProfile {
            is_default: true,
            ..ConnectionProfile::default()
        });
        let mut session = Session::new();
        session.switch_to(ConnectionProfile::default(), fake);
        let app = App::with_session(
            config,
            session,
            dir.path().join("config.toml"),
            dir.path().join("app.log"),
        );
        (app, dir)
    }

    /// Dispatch queued work and apply results until the next non-progress event.
    async fn settle(app: &mut App) {
        app.dispatch_pending();
        while let Some(event) = app.bg_rx.recv().await {
            let progress = matches!(event, BgEvent::BatchProgress { .. });
            app.apply_bg_event(event);
            if !progress {
                break;
            }
        }
    }

    /// Dispatch and apply results until no refresh, load or batch is running.
    async fn drain(app: &mut App) {
        loop {
            app.dispatch_pending();
            let busy = app.batch_running
                || app.browser.is_loading()
                || app.directory.is_refreshing(&app.session);
            if !busy {
                return;
            }
            let event = app.bg_rx.recv().await.unwrap();
            app.apply_bg_event(event);
        }
    }

    fn orders_broker() -> FakeBroker {
        FakeBroker::new()
            .with_queues(&["Orders"])
            .with_messages(
                "Orders",
                vec![
                    message("a", "T", "1"),
                    message("b", "T", "2"),
                    message("c", "T", "3"),
                ],
            )
            .rejecting("c")
    }

    #[test]
    fn starts_with_connection_list_when_nothing_is_active() {
        let dir = TempDir::new().unwrap();
        let app = App::with_session(
            AppConfig::default(),
            Session::new(),
            dir.path().join("config.toml"),
            dir.path().join("app.log"),
        );
        assert_eq!(app.modal, ActiveModal::ConnectionList);
        assert!(app.pending().is_empty());
    }

    #[tokio::test]
    async fn startup_refresh_fills_queue_panel() {
        let fake = Arc::new(FakeBroker::new().with_queues(&["Orders", "DLQ.Orders"]));
        let (mut app, _dir) = fixture(fake);
        assert_eq!(app.pending(), &[Action::RefreshQueues]);

        settle(&mut app).await;
        assert_eq!(app.visible_queues().len(), 2);
        assert_eq!(app.status_message, "Loaded 2 queues");

        app.queue_filter = "dlq".into();
        app.clamp_cursors();
        assert_eq!(app.selected_queue_name().as_deref(), Some("DLQ.Orders"));
    }

    #[tokio::test]
    async fn repeated_requests_are_queued_once() {
        let (mut app, _dir) = fixture(Arc::new(FakeBroker::new()));
        app.request(Action::RefreshQueues);
        app.request(Action::RefreshQueues);
        assert_eq!(app.pending().len(), 1);
    }

    #[tokio::test]
    async fn refresh_after_switch_ignores_old_result() {
        let fake_a = Arc::new(FakeBroker::new().with_queues(&["A.only"]));
        let (mut app, _dir) = fixture(fake_a);
        app.dispatch_pending();
        let stale = app.bg_rx.recv().await.unwrap();

        let fake_b = Arc::new(FakeBroker::new().with_queues(&["B.only"]));
        app.activate(
            ConnectionProfile {
                name: "B".into(),
                ..ConnectionProfile::default()
            },
            fake_b,
        );
        settle(&mut app).await;
        app.apply_bg_event(stale);

        assert!(!app.status_is_error);
        let names: Vec<_> = app.visible_queues().iter().map(|q| q.name.clone()).collect();
        assert_eq!(names, vec!["B.only"]);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported_and_clears_panel() {
        let fake = Arc::new(FakeBroker::new().with_queues(&["A"]));
        let (mut app, _dir) = fixture(fake.clone());
        settle(&mut app).await;

        fake.set_list_fails(true);
        app.request(Action::RefreshQueues);
        settle(&mut app).await;
        assert!(app.status_is_error);
        assert!(app.visible_queues().is_empty());
    }

    #[tokio::test]
    async fn batch_delete_reloads_and_keeps_outcome_visible() {
        let (mut app, _dir) = fixture(Arc::new(orders_broker()));
        drain(&mut app).await;
        app.open_selected_queue();
        drain(&mut app).await;
        assert_eq!(app.visible_messages().len(), 3);

        app.select_all_visible();
        app.open_confirm_delete();
        assert_eq!(app.modal, ActiveModal::ConfirmDelete { count: 3 });
        app.confirm_delete();
        drain(&mut app).await;

        // The follow-up reload and queue refresh have run by now.
        assert!(app.pending().is_empty());
        assert_eq!(
            app.last_batch,
            Some(BatchReport {
                summary: "Deleted 2/3 message(s), 1 failed".into(),
                failed: true,
            })
        );
        assert!(app.browser.selection().is_empty());
        let left: Vec<_> = app.visible_messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(left, vec!["c"]);
    }

    #[tokio::test]
    async fn reload_after_batch_wins_over_load_started_during_it() {
        let fake = Arc::new(orders_broker());
        let (mut app, _dir) = fixture(fake.clone());
        drain(&mut app).await;
        app.open_selected_queue();
        drain(&mut app).await;

        app.select_all_visible();
        app.confirm_delete();
        app.dispatch_pending();
        assert!(app.batch_running);

        // A manual reload answered before the batch touched the queue.
        let (early, client) = app.browser.begin_load(&app.session, "Orders").unwrap();
        let early_result = client.browse_messages("Orders").await;
        assert_eq!(early_result.as_ref().unwrap().len(), 3);

        loop {
            let event = app.bg_rx.recv().await.unwrap();
            let done = matches!(event, BgEvent::BatchComplete { .. });
            app.apply_bg_event(event);
            if done {
                break;
            }
        }
        assert!(app.pending().contains(&Action::ReloadMessages("Orders".into())));
        app.dispatch_pending();
        assert!(app.pending().is_empty());

        app.apply_bg_event(BgEvent::MessagesLoaded {
            ticket: early,
            result: early_result,
        });
        drain(&mut app).await;

        let left: Vec<_> = app.visible_messages().iter().map(|m| m.id.clone()).collect();
        assert_eq!(left, vec!["c"]);
        assert_eq!(fake.remaining("Orders"), vec!["c"]);
    }

    #[tokio::test]
    async fn move_defaults_to_highlighted_message_and_uses_suggestions() {
        let fake = Arc::new(
            FakeBroker::new()
                .with_queues(&["DLQ.Orders", "Orders", "Payments"])
                .with_messages("DLQ.Orders", vec![message("x", "T", "1"), message("y", "T", "2")]),
        );
        let (mut app, _dir) = fixture(fake.clone());
        settle(&mut app).await;
        app.request(Action::LoadMessages("DLQ.Orders".into()));
        settle(&mut app).await;

        app.open_move_modal();
        assert_eq!(app.modal, ActiveModal::MoveTarget { count: 1 });
        assert_eq!(app.move_suggestions, vec!["Orders", "Payments"]);

        app.suggestion_index = Some(0);
        app.confirm_move();
        assert_eq!(app.modal, ActiveModal::None);
        settle(&mut app).await;
        assert_eq!(app.status_message, "Moved 1 message(s) to 'Orders'");
        assert_eq!(fake.remaining("Orders"), vec!["x"]);
    }

    #[tokio::test]
    async fn move_onto_source_keeps_modal_open() {
        let fake = Arc::new(
            FakeBroker::new()
                .with_queues(&["Orders"])
                .with_messages("Orders", vec![message("x", "T", "1")]),
        );
        let (mut app, _dir) = fixture(fake.clone());
        settle(&mut app).await;
        app.open_selected_queue();
        settle(&mut app).await;
        let calls = fake.calls();

        app.open_move_modal();
        app.input_buffer = "Orders".into();
        app.confirm_move();
        assert!(app.status_is_error);
        assert!(matches!(app.modal, ActiveModal::MoveTarget { .. }));
        assert!(app.pending().is_empty());
        assert_eq!(fake.calls(), calls);
    }

    #[tokio::test]
    async fn auto_refresh_skips_while_refreshing() {
        let (mut app, _dir) = fixture(Arc::new(FakeBroker::new()));
        app.config.settings.auto_refresh_secs = 1;
        app.dispatch_pending();
        assert!(app.directory.is_refreshing(&app.session));

        app.tick(Instant::now() + Duration::from_secs(5));
        assert!(app.pending().is_empty());

        settle(&mut app).await;
        app.tick(Instant::now() + Duration::from_secs(10));
        assert_eq!(app.pending(), &[Action::RefreshQueues]);
    }

    #[tokio::test]
    async fn connection_form_adds_and_persists_profile() {
        let (mut app, dir) = fixture(Arc::new(FakeBroker::new()));
        app.open_connection_form(None);
        app.input_fields[FORM_NAME].1 = "staging".into();
        app.input_fields[FORM_HOST].1 = "mq.staging".into();
        app.input_fields[FORM_PORT].1 = "8443".into();
        app.input_fields[FORM_TLS].1 = "true".into();
        app.submit_connection_form();

        assert_eq!(app.modal, ActiveModal::ConnectionList);
        let saved = AppConfig::load_from(&dir.path().join("config.toml"));
        let staging = saved.get("staging").unwrap();
        assert_eq!(staging.port, 8443);
        assert!(staging.use_tls);
        assert!(!staging.is_default);
        assert_eq!(saved.default_connection().unwrap().name, "Local");
    }

    #[tokio::test]
    async fn editing_active_profile_reconnects_with_new_settings() {
        let (mut app, _dir) = fixture(Arc::new(FakeBroker::new()));
        drain(&mut app).await;
        let before = app.session.epoch();

        app.open_connection_form(Some("Local".into()));
        app.input_fields[FORM_HOST].1 = "mq.internal".into();
        app.submit_connection_form();

        assert_eq!(app.modal, ActiveModal::None);
        assert_eq!(app.session.active().unwrap().host, "mq.internal");
        assert!(!app.session.is_current(before));
        assert_eq!(app.pending(), &[Action::RefreshQueues]);
    }

    #[tokio::test]
    async fn deleting_active_profile_says_session_stays_open() {
        let (mut app, _dir) = fixture(Arc::new(FakeBroker::new()));
        app.open_connection_list();
        assert_eq!(app.selected_connection_name().as_deref(), Some("Local"));

        app.delete_selected_connection();
        assert!(app.config.connections.is_empty());
        assert!(app.session.active().is_some());
        assert!(app.status_message.contains("stays open until you switch"));
    }

    #[tokio::test]
    async fn connection_form_rejects_bad_port() {
        let (mut app, _dir) = fixture(Arc::new(FakeBroker::new()));
        app.open_connection_form(Some("Local".into()));
        app.input_fields[FORM_PORT].1 = "eighty".into();
        app.submit_connection_form();
        assert!(app.status_is_error);
        assert!(matches!(app.modal, ActiveModal::ConnectionForm { .. }));
    }

    #[test]
    fn log_tail_keeps_last_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let content: String = (0..20).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(&path, content).unwrap();

        let tail = read_log_tail(&path, 5).unwrap();
        assert_eq!(tail.len(), 5);
        assert_eq!(tail[0], "line 15");
        assert_eq!(tail[4], "line 19");
        assert!(read_log_tail(&dir.path().join("missing.log"), 5).is_err());
    }
}
