use crate::{
    backend::{Backend, OfflineBackend, ProcessBackend},
    config::{AppConfig, EntrySource},
    error::BackendError,
    gate::PlayGate,
    import::ImportForm,
    progress::{ProgressCell, ProgressInfo},
    protocol::{ImportOutcome, LaunchTarget},
    registry::{Entry, Profile, Registry},
    selection::Selection,
};
use anyhow::{Context, Result};
use arboard::Clipboard;
use std::{
    collections::VecDeque,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};
use time::format_description::well_known::Rfc3339;

const LOG_CAPACITY: usize = 200;
const LOG_COPY_LINES: usize = 50;
const TOAST_SECS: u64 = 3;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub level: ToastLevel,
    pub expires_at: Instant,
}

/// Work to resume once a lazily triggered profile load settles.
#[derive(Debug, Clone)]
enum LoadFollowup {
    Select(String),
    Append(Profile),
}

enum BackendMessage {
    Loaded {
        result: Result<Vec<Profile>, BackendError>,
        then: Option<LoadFollowup>,
    },
    Imported {
        name: String,
        result: Result<ImportOutcome, BackendError>,
    },
    Launched {
        label: String,
        result: Result<Option<i32>, BackendError>,
    },
}

pub struct App {
    pub config: AppConfig,
    pub registry: Registry,
    pub selection: Selection,
    pub gate: PlayGate,
    pub import_form: ImportForm,
    pub progress: ProgressCell,
    pub status: String,
    pub cursor: usize,
    pub logs: VecDeque<LogEntry>,
    pub log_scroll: usize,
    pub toast: Option<Toast>,
    pub should_quit: bool,
    backend: Arc<dyn Backend>,
    clipboard: Option<Clipboard>,
    log_path: PathBuf,
    backend_tx: Sender<BackendMessage>,
    backend_rx: Receiver<BackendMessage>,
    notice_rx: Option<Receiver<String>>,
    loads_in_flight: usize,
    import_active: bool,
}

impl App {
    /// Starts the configured backend process and issues the initial load.
    /// A backend that cannot be started leaves the UI running offline.
    pub fn initialize(config: AppConfig) -> Self {
        let (notice_tx, notice_rx) = mpsc::channel();
        let notice_tx = Mutex::new(notice_tx);
        let (backend, startup_error): (Arc<dyn Backend>, Option<BackendError>) =
            match ProcessBackend::spawn(&config.backend) {
                Ok(process) => {
                    process.set_notice_sink(Arc::new(move |message: String| {
                        if let Ok(tx) = notice_tx.lock() {
                            let _ = tx.send(message);
                        }
                    }));
                    let backend: Arc<dyn Backend> = Arc::new(process);
                    (backend, None)
                }
                Err(err) => {
                    let backend: Arc<dyn Backend> =
                        Arc::new(OfflineBackend::new(err.to_string()));
                    (backend, Some(err))
                }
            };

        let mut app = Self::with_backend(config, backend);
        app.notice_rx = Some(notice_rx);
        if let Some(err) = startup_error {
            app.status = "Backend unavailable".to_string();
            app.log_error(format!("Backend start failed: {err}"));
        }
        app.mount();
        app
    }

    pub fn with_backend(config: AppConfig, backend: Arc<dyn Backend>) -> Self {
        let progress = ProgressCell::default();
        let writer = progress.clone();
        backend.subscribe_progress(Arc::new(move |info: ProgressInfo| writer.publish(info)));

        let (backend_tx, backend_rx) = mpsc::channel();
        let log_path = config.log_path();
        Self {
            config,
            registry: Registry::new(),
            selection: Selection::default(),
            gate: PlayGate::default(),
            import_form: ImportForm::default(),
            progress,
            status: "Ready".to_string(),
            cursor: 0,
            logs: VecDeque::new(),
            log_scroll: 0,
            toast: None,
            should_quit: false,
            backend,
            clipboard: None,
            log_path,
            backend_tx,
            backend_rx,
            notice_rx: None,
            loads_in_flight: 0,
            import_active: false,
        }
    }

    pub fn mount(&mut self) {
        self.load(None);
    }

    pub fn tick(&mut self) {
        if let Some(toast) = &self.toast {
            if toast.expires_at <= Instant::now() {
                self.toast = None;
            }
        }
    }

    pub fn is_busy(&self) -> bool {
        self.loads_in_flight > 0 || self.import_active || self.gate.is_launching()
    }

    pub fn is_loading(&self) -> bool {
        self.loads_in_flight > 0
    }

    pub fn import_active(&self) -> bool {
        self.import_active
    }

    pub fn visible_entries(&self) -> Vec<&Entry> {
        self.registry.visible()
    }

    pub fn progress_snapshot(&self) -> Option<ProgressInfo> {
        self.progress.snapshot()
    }

    fn load(&mut self, then: Option<LoadFollowup>) {
        if self.config.entry_source == EntrySource::Games {
            let catalog: Vec<Entry> = self.config.games.iter().cloned().map(Entry::Game).collect();
            let count = catalog.len();
            self.registry.replace(catalog);
            self.log_info(format!("Loaded {count} game(s) from catalog"));
            if let Some(then) = then {
                self.apply_followup(then);
            }
            self.clamp_cursor();
            return;
        }

        self.loads_in_flight += 1;
        self.status = "Loading profiles...".to_string();
        let backend = Arc::clone(&self.backend);
        let tx = self.backend_tx.clone();
        thread::spawn(move || {
            let result = backend.load_profiles();
            let _ = tx.send(BackendMessage::Loaded { result, then });
        });
    }

    /// Selects the entry keyed by `identifier`; unknown keys clear the
    /// selection. An empty registry is loaded first.
    pub fn select(&mut self, identifier: &str) {
        if self.registry.is_empty() {
            self.load(Some(LoadFollowup::Select(identifier.to_string())));
            return;
        }
        self.apply_select(identifier);
    }

    pub fn select_under_cursor(&mut self) {
        let key = self
            .visible_entries()
            .get(self.cursor)
            .map(|entry| entry.key().to_string());
        match key {
            Some(key) => self.select(&key),
            None if self.registry.is_empty() => self.load(None),
            None => {}
        }
    }

    fn apply_select(&mut self, identifier: &str) {
        let matched = self.selection.select(&self.registry, identifier);
        self.gate.on_selection(matched);
        match self.selection.current() {
            Some(entry) => {
                self.status = format!("Selected {}", entry.display_name());
            }
            None => {
                self.status = "Nothing selected".to_string();
                self.log_warn(format!("No entry matches \"{identifier}\""));
            }
        }
    }

    pub fn move_cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_cursor_down(&mut self) {
        self.cursor = self.cursor.saturating_add(1);
        self.clamp_cursor();
    }

    pub fn clamp_cursor(&mut self) {
        let len = self.visible_entries().len();
        if len == 0 {
            self.cursor = 0;
        } else if self.cursor >= len {
            self.cursor = len - 1;
        }
    }

    /// Play click. Does nothing unless the gate is open.
    pub fn play(&mut self) {
        let Some(target) = self.selection.current().map(LaunchTarget::from) else {
            self.gate.begin_launch(false);
            return;
        };
        if !self.gate.begin_launch(true) {
            return;
        }

        let label = target.label().to_string();
        self.status = format!("Launching {label}...");
        self.log_info(format!("Launch started: {label}"));
        let backend = Arc::clone(&self.backend);
        let tx = self.backend_tx.clone();
        thread::spawn(move || {
            let result = backend.launch(&target);
            let _ = tx.send(BackendMessage::Launched { label, result });
        });
    }

    pub fn open_import(&mut self) {
        self.import_form.open();
    }

    pub fn hide_import(&mut self) {
        self.import_form.hide();
    }

    pub fn submit_import(&mut self) {
        if self.import_active {
            self.log_warn("Import already in progress".to_string());
            return;
        }
        let name = match self.import_form.submission() {
            Ok(name) => name,
            Err(err) => {
                self.status = format!("Import: {err}");
                self.log_warn(format!("Import rejected: {err}"));
                self.set_toast("Enter a profile name", ToastLevel::Warn, Duration::from_secs(2));
                return;
            }
        };

        self.import_active = true;
        self.status = format!("Importing {name}...");
        self.log_info(format!("Import started: {name}"));
        let backend = Arc::clone(&self.backend);
        let tx = self.backend_tx.clone();
        thread::spawn(move || {
            let result = backend.import_profile(&name);
            let _ = tx.send(BackendMessage::Imported { name, result });
        });
    }

    pub fn toggle_side_panel(&mut self) {
        self.config.side_panel_open = !self.config.side_panel_open;
        if let Err(err) = self.config.save() {
            self.log_warn(format!("Config save failed: {err:#}"));
        }
    }

    /// Asks the backend to close and quits; the backend's answer is ignored.
    pub fn close(&mut self) {
        let _ = self.backend.close();
        self.should_quit = true;
    }

    pub fn poll_backend(&mut self) {
        loop {
            match self.backend_rx.try_recv() {
                Ok(message) => self.handle_backend_message(message),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }

        let mut notices = Vec::new();
        if let Some(rx) = &self.notice_rx {
            while let Ok(message) = rx.try_recv() {
                notices.push(message);
            }
        }
        for message in notices {
            self.log_warn(message);
        }
    }

    fn handle_backend_message(&mut self, message: BackendMessage) {
        match message {
            BackendMessage::Loaded { result, then } => {
                self.loads_in_flight = self.loads_in_flight.saturating_sub(1);
                match result {
                    Ok(profiles) => {
                        let count = profiles.len();
                        self.registry
                            .replace(profiles.into_iter().map(Entry::Profile).collect());
                        self.status = format!("{count} profile(s)");
                        self.log_info(format!("Loaded {count} profile(s)"));
                    }
                    Err(err) => {
                        self.status = "Profile load failed".to_string();
                        self.log_error(format!("Profile load failed: {err}"));
                        self.set_toast(
                            "Could not load profiles",
                            ToastLevel::Warn,
                            Duration::from_secs(TOAST_SECS),
                        );
                    }
                }
                if let Some(then) = then {
                    self.apply_followup(then);
                }
                self.clamp_cursor();
            }
            BackendMessage::Imported { name, result } => {
                self.import_active = false;
                match result {
                    Ok(ImportOutcome::Imported(profile)) => {
                        if self.registry.is_empty() {
                            self.load(Some(LoadFollowup::Append(profile)));
                        } else {
                            self.finish_import(profile);
                        }
                    }
                    Ok(ImportOutcome::Cancelled) => {
                        self.status = "Import cancelled".to_string();
                        self.log_info(format!("Import cancelled: {name}"));
                    }
                    Err(err) => {
                        self.status = format!("Import failed: {name}");
                        self.log_error(format!("Import failed: {err}"));
                        self.set_toast(
                            &format!("Import failed: {name}"),
                            ToastLevel::Error,
                            Duration::from_secs(TOAST_SECS),
                        );
                    }
                }
            }
            BackendMessage::Launched { label, result } => {
                self.gate.settle(self.selection.is_some());
                match result {
                    Ok(Some(code)) => {
                        self.status = format!("{label} exited with code {code}");
                        self.log_info(format!("{label} exited with code {code}"));
                    }
                    Ok(None) => {
                        self.status = format!("Launched {label}");
                        self.log_info(format!("Launched {label}"));
                    }
                    Err(err) => {
                        self.status = format!("Launch failed: {label}");
                        self.log_error(format!("Launch failed: {err}"));
                        self.set_toast(
                            &format!("Launch failed: {label}"),
                            ToastLevel::Error,
                            Duration::from_secs(TOAST_SECS),
                        );
                    }
                }
            }
        }
    }

    fn apply_followup(&mut self, then: LoadFollowup) {
        match then {
            LoadFollowup::Select(identifier) => self.apply_select(&identifier),
            LoadFollowup::Append(profile) => self.finish_import(profile),
        }
    }

    fn finish_import(&mut self, profile: Profile) {
        let name = profile.name.clone();
        self.registry.append(Entry::Profile(profile));
        self.import_form.clear_and_hide();
        self.status = format!("Imported {name}");
        self.log_info(format!("Imported profile {name}"));
        self.set_toast(
            &format!("Imported {name}"),
            ToastLevel::Info,
            Duration::from_secs(TOAST_SECS),
        );
    }

    pub fn set_toast(&mut self, message: &str, level: ToastLevel, duration: Duration) {
        self.toast = Some(Toast {
            message: message.to_string(),
            level,
            expires_at: Instant::now() + duration,
        });
    }

    pub fn scroll_log_up(&mut self, lines: usize) {
        let max = self.logs.len().saturating_sub(1);
        self.log_scroll = self.log_scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_log_down(&mut self, lines: usize) {
        self.log_scroll = self.log_scroll.saturating_sub(lines);
    }

    pub fn log_info(&mut self, message: String) {
        self.push_log(LogLevel::Info, message);
    }

    pub fn log_warn(&mut self, message: String) {
        self.push_log(LogLevel::Warn, message);
    }

    pub fn log_error(&mut self, message: String) {
        self.push_log(LogLevel::Error, message);
    }

    fn push_log(&mut self, level: LogLevel, message: String) {
        let _ = append_log_file(&self.log_path, level, &message);

        // Scroll counts up from the newest line; keep a scrolled view pinned.
        if self.log_scroll > 0 {
            self.log_scroll += 1;
        }
        self.logs.push_back(LogEntry { level, message });
        while self.logs.len() > LOG_CAPACITY {
            self.logs.pop_front();
        }
        self.log_scroll = self.log_scroll.min(self.logs.len().saturating_sub(1));
    }

    fn log_tail_text(&self, lines: usize) -> Result<String> {
        let raw = if self.log_path.exists() {
            fs::read_to_string(&self.log_path).context("read log file")?
        } else {
            self.logs
                .iter()
                .map(|entry| format!("[{}] {}", log_level_label(entry.level), entry.message))
                .collect::<Vec<String>>()
                .join("\n")
        };
        let entries: Vec<&str> = raw.lines().collect();
        let start = entries.len().saturating_sub(lines);
        Ok(entries[start..].join("\n"))
    }

    pub fn copy_log_tail_to_clipboard(&mut self) {
        match self.log_tail_text(LOG_COPY_LINES) {
            Ok(text) => {
                if text.is_empty() {
                    self.status = "Log is empty".to_string();
                    self.set_toast("Log is empty", ToastLevel::Warn, Duration::from_secs(2));
                    return;
                }
                if self.copy_to_clipboard(&text) {
                    self.status = format!("Copied last {LOG_COPY_LINES} log lines");
                    self.set_toast(
                        "Log copied to clipboard",
                        ToastLevel::Info,
                        Duration::from_secs(2),
                    );
                } else {
                    self.status = "Copy failed".to_string();
                }
            }
            Err(err) => {
                self.status = format!("Copy failed: {err}");
                self.log_error(format!("Copy failed: {err:#}"));
            }
        }
    }

    fn copy_to_clipboard(&mut self, text: &str) -> bool {
        let result = match self.clipboard_mut() {
            Some(clipboard) => clipboard.set_text(text.to_string()),
            None => return false,
        };
        if let Err(err) = result {
            self.log_warn(format!("Clipboard copy failed: {err}"));
            return false;
        }
        true
    }

    fn clipboard_mut(&mut self) -> Option<&mut Clipboard> {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(err) => {
                    self.log_warn(format!("Clipboard unavailable: {err}"));
                    return None;
                }
            }
        }
        self.clipboard.as_mut()
    }
}

fn log_level_label(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO",
        LogLevel::Warn => "WARN",
        LogLevel::Error => "ERROR",
    }
}

fn append_log_file(path: &Path, level: LogLevel, message: &str) -> std::io::Result<()> {
    let label = log_level_label(level);
    let stamp = time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{stamp} [{label}] {message}")
}
