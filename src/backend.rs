use crate::{
    config::BackendCommand,
    error::BackendError,
    progress::ProgressInfo,
    protocol::{
        self, ImportOutcome, Incoming, LaunchTarget, CMD_CLOSE, CMD_IMPORT, CMD_LAUNCH,
        CMD_LOAD_PROFILES, EVENT_DOWNLOAD_PROGRESS,
    },
    registry::Profile,
};
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    io::{BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc, Mutex, MutexGuard,
    },
    thread,
};

pub type ProgressSink = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Failures the reader thread wants surfaced in the log (bad frames, exit).
pub type NoticeSink = Arc<dyn Fn(String) + Send + Sync>;

/// The native service doing the real work. Calls block the calling thread;
/// the controller runs them off the UI thread.
pub trait Backend: Send + Sync {
    /// Asks the backend to shut down. Returns once the request is sent.
    fn close(&self) -> Result<(), BackendError>;
    /// Returns the game's exit code when the backend reports one.
    fn launch(&self, target: &LaunchTarget) -> Result<Option<i32>, BackendError>;
    fn import_profile(&self, name: &str) -> Result<ImportOutcome, BackendError>;
    fn load_profiles(&self) -> Result<Vec<Profile>, BackendError>;
    fn subscribe_progress(&self, sink: ProgressSink);
}

#[derive(Default)]
struct PendingReplies {
    waiting: HashMap<u64, Sender<Result<Value, String>>>,
    exited: Option<String>,
}

#[derive(Default)]
struct Shared {
    pending: Mutex<PendingReplies>,
    progress: Mutex<Option<ProgressSink>>,
    notices: Mutex<Option<NoticeSink>>,
}

/// Backend reached through a child process speaking JSON lines.
pub struct ProcessBackend {
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    next_id: AtomicU64,
    shared: Arc<Shared>,
}

impl ProcessBackend {
    pub fn spawn(command: &BackendCommand) -> Result<Self, BackendError> {
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                BackendError::unavailable("spawn", format!("{}: {err}", command.program))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BackendError::unavailable("spawn", "stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BackendError::unavailable("spawn", "stdout not captured"))?;

        let shared = Arc::new(Shared::default());
        let reader_shared = Arc::clone(&shared);
        thread::spawn(move || read_frames(stdout, reader_shared));

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            next_id: AtomicU64::new(1),
            shared,
        })
    }

    pub fn set_notice_sink(&self, sink: NoticeSink) {
        *lock(&self.shared.notices) = Some(sink);
    }

    /// Registers a reply slot for a fresh id and writes the request.
    fn send(
        &self,
        cmd: &str,
        payload: Value,
    ) -> Result<Receiver<Result<Value, String>>, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = protocol::encode_request(id, cmd, payload)?;
        let (tx, rx) = mpsc::channel();
        {
            let mut pending = lock(&self.shared.pending);
            if let Some(reason) = pending.exited.clone() {
                return Err(BackendError::unavailable(cmd, reason));
            }
            pending.waiting.insert(id, tx);
        }

        let written = {
            let mut stdin = lock(&self.stdin);
            stdin
                .write_all(line.as_bytes())
                .and_then(|_| stdin.flush())
        };
        if let Err(err) = written {
            lock(&self.shared.pending).waiting.remove(&id);
            return Err(BackendError::unavailable(cmd, format!("write failed: {err}")));
        }
        Ok(rx)
    }

    /// Fire-and-forget request; a late reply lands in a dropped slot.
    fn post(&self, cmd: &str, payload: Value) -> Result<(), BackendError> {
        self.send(cmd, payload).map(drop)
    }

    fn invoke(&self, cmd: &str, payload: Value) -> Result<Value, BackendError> {
        let rx = self.send(cmd, payload)?;
        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(BackendError::unavailable(cmd, message)),
            Err(_) => Err(BackendError::unavailable(cmd, "backend exited")),
        }
    }
}

impl Backend for ProcessBackend {
    /// Writes the close frame and returns without waiting for a reply.
    fn close(&self) -> Result<(), BackendError> {
        self.post(CMD_CLOSE, json!({}))
    }

    fn launch(&self, target: &LaunchTarget) -> Result<Option<i32>, BackendError> {
        let value = self.invoke(CMD_LAUNCH, target.payload())?;
        Ok(serde_json::from_value(value)?)
    }

    fn import_profile(&self, name: &str) -> Result<ImportOutcome, BackendError> {
        let value = self.invoke(CMD_IMPORT, json!({ "name": name }))?;
        Ok(protocol::import_outcome(value)?)
    }

    fn load_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let value = self.invoke(CMD_LOAD_PROFILES, json!({}))?;
        Ok(serde_json::from_value(value)?)
    }

    fn subscribe_progress(&self, sink: ProgressSink) {
        *lock(&self.shared.progress) = Some(sink);
    }
}

impl Drop for ProcessBackend {
    fn drop(&mut self) {
        let mut child = lock(&self.child);
        let _ = child.kill();
        let _ = child.wait();
    }
}

fn read_frames(stdout: ChildStdout, shared: Arc<Shared>) {
    let reader = BufReader::new(stdout);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                notify(&shared, format!("Backend read failed: {err}"));
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match protocol::decode_incoming(&line) {
            Ok(Incoming::Reply(reply)) => {
                let Some(tx) = lock(&shared.pending).waiting.remove(&reply.id) else {
                    notify(&shared, format!("Backend replied to unknown request {}", reply.id));
                    continue;
                };
                let result = match reply.error {
                    Some(message) => Err(message),
                    None => Ok(reply.ok),
                };
                let _ = tx.send(result);
            }
            Ok(Incoming::Event(event)) if event.event == EVENT_DOWNLOAD_PROGRESS => {
                match serde_json::from_value::<ProgressInfo>(event.payload) {
                    Ok(info) => {
                        let sink = lock(&shared.progress).clone();
                        if let Some(sink) = sink {
                            sink(info);
                        }
                    }
                    Err(err) => notify(&shared, format!("Malformed progress event: {err}")),
                }
            }
            Ok(Incoming::Event(event)) => {
                notify(&shared, format!("Ignoring backend event: {}", event.event));
            }
            Err(err) => notify(&shared, format!("Malformed backend frame: {err}")),
        }
    }

    {
        let mut pending = lock(&shared.pending);
        pending.exited = Some("backend exited".to_string());
        // Dropping the senders wakes every caller still waiting.
        pending.waiting.clear();
    }
    notify(&shared, "Backend process exited".to_string());
}

fn notify(shared: &Shared, message: String) {
    let sink = lock(&shared.notices).clone();
    if let Some(sink) = sink {
        sink(message);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Stand-in used when the backend process could not be started.
pub struct OfflineBackend {
    reason: String,
}

impl OfflineBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Backend for OfflineBackend {
    fn close(&self) -> Result<(), BackendError> {
        Err(BackendError::unavailable(CMD_CLOSE, self.reason.clone()))
    }

    fn launch(&self, _target: &LaunchTarget) -> Result<Option<i32>, BackendError> {
        Err(BackendError::unavailable(CMD_LAUNCH, self.reason.clone()))
    }

    fn import_profile(&self, _name: &str) -> Result<ImportOutcome, BackendError> {
        Err(BackendError::unavailable(CMD_IMPORT, self.reason.clone()))
    }

    fn load_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        Err(BackendError::unavailable(CMD_LOAD_PROFILES, self.reason.clone()))
    }

    fn subscribe_progress(&self, _sink: ProgressSink) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressCell;
    use std::time::{Duration, Instant};

    #[test]
    fn offline_backend_rejects_every_call() {
        let backend = OfflineBackend::new("not installed");
        let err = backend.load_profiles().expect_err("offline");
        assert!(err.to_string().contains("not installed"));
        assert!(backend.import_profile("x").is_err());
        assert!(backend
            .launch(&LaunchTarget::Game { id: "bb-og".to_string() })
            .is_err());
    }

    #[test]
    fn spawn_failure_is_unavailable() {
        let command = BackendCommand {
            program: "/nonexistent/playdeck-backend".to_string(),
            args: Vec::new(),
        };
        match ProcessBackend::spawn(&command) {
            Err(BackendError::Unavailable { command, .. }) => assert_eq!(command, "spawn"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("spawn should fail"),
        }
    }

    #[cfg(unix)]
    fn scripted(script: &str) -> ProcessBackend {
        let command = BackendCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        };
        ProcessBackend::spawn(&command).expect("spawn sh")
    }

    // Echoes the request id back with a fixed payload.
    #[cfg(unix)]
    const REPLY_LOOP: &str = r#"while IFS= read -r line; do
id=$(printf '%s' "$line" | sed 's/^{"id":\([0-9]*\).*/\1/')
case "$line" in
  *'"cmd":"load_profiles"'*) printf '{"id":%s,"ok":[{"game":"ultracraft","name":"A","version":"1.0"}]}\n' "$id" ;;
  *'"cmd":"import"'*) printf '{"id":%s,"ok":{"game":"error","name":"ERROR","version":"error"}}\n' "$id" ;;
  *'"cmd":"launch"'*) printf '{"id":%s,"error":"sdk missing"}\n' "$id" ;;
  *) printf '{"id":%s,"ok":null}\n' "$id" ;;
esac
done"#;

    #[cfg(unix)]
    #[test]
    fn round_trips_calls_through_child_process() {
        let backend = scripted(REPLY_LOOP);

        let profiles = backend.load_profiles().expect("load");
        assert_eq!(profiles, vec![Profile::new("ultracraft", "A", "1.0")]);

        assert_eq!(
            backend.import_profile("Survival").expect("import"),
            ImportOutcome::Cancelled
        );

        let err = backend
            .launch(&LaunchTarget::Profile(profiles[0].clone()))
            .expect_err("launch rejected");
        assert!(err.to_string().contains("sdk missing"));

        backend.close().expect("close");
    }

    #[cfg(unix)]
    #[test]
    fn close_does_not_wait_for_a_silent_backend() {
        let backend = Arc::new(scripted("while read -r l; do :; done"));
        let (done_tx, done_rx) = mpsc::channel();
        let closer = Arc::clone(&backend);
        thread::spawn(move || {
            let _ = done_tx.send(closer.close());
        });

        let result = done_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("close returned without a reply");
        assert!(result.is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn progress_events_reach_the_sink() {
        // Events go out before the reply, so they are applied by the time
        // the call returns.
        let backend = scripted(
            r#"read -r line
printf '{"event":"downloadProgress","payload":{"downloaded":1,"total":4,"percent":25,"downloading":true,"status":"Downloading: a"}}\n'
printf '{"event":"downloadProgress","payload":{"downloaded":4,"total":4,"percent":100,"downloading":false,"status":"Done"}}\n'
printf '{"id":1,"ok":[]}\n'
sleep 5"#,
        );
        let cell = ProgressCell::default();
        let writer = cell.clone();
        backend.subscribe_progress(Arc::new(move |info| writer.publish(info)));

        assert!(backend.load_profiles().expect("load").is_empty());
        let last = cell.snapshot().expect("snapshot");
        assert!(!last.is_active);
        assert_eq!(last.status_text, "Done");
    }

    #[cfg(unix)]
    #[test]
    fn exited_backend_fails_pending_and_later_calls() {
        let backend = scripted("read -r line; exit 0");

        let err = backend.load_profiles().expect_err("backend exits");
        assert!(matches!(err, BackendError::Unavailable { .. }));

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match backend.load_profiles() {
                Err(BackendError::Unavailable { reason, .. }) if reason == "backend exited" => {
                    break
                }
                _ => {
                    assert!(Instant::now() < deadline, "exit never observed");
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
    }
}
