//! Traffic capture supervision
//!
//! Provides:
//! - Spawning capture processes (tcpdump) scoped to one interface
//! - Routing output to a file, or draining it live to the terminal
//! - Graceful stop with a bounded wait, falling back to SIGKILL

use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// ARP, DHCP, HTTP and HTTPS
pub const DEFAULT_FILTER: &str = "arp or (udp portrange 67-68) or tcp port 80 or tcp port 443";

/// Capture program used unless configured otherwise
pub const DEFAULT_PROGRAM: &str = "tcpdump";

/// Numeric output, line buffered, verbose decode
pub const DEFAULT_ARGS: [&str; 3] = ["-n", "-l", "-vv"];

/// How long a capture gets to exit after SIGTERM
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long to wait for a drain thread once its process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// What to capture and where to send it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Interface to capture on
    pub interface: String,
    /// Output file; live terminal output when absent
    pub destination: Option<PathBuf>,
    /// Capture filter expression
    pub filter: String,
}

impl CaptureRequest {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            destination: None,
            filter: DEFAULT_FILTER.to_string(),
        }
    }

    pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
        self.destination = Some(path.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Builds the command line for a capture process
pub trait CaptureLauncher {
    fn command(&self, request: &CaptureRequest) -> Command;
}

/// `tcpdump -n -l -vv -i <iface> <filter>`
#[derive(Debug, Clone)]
pub struct Tcpdump {
    program: PathBuf,
    args: Vec<String>,
}

impl Default for Tcpdump {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROGRAM,
            DEFAULT_ARGS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

impl Tcpdump {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl CaptureLauncher for Tcpdump {
    fn command(&self, request: &CaptureRequest) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg("-i").arg(&request.interface);
        let filter = request.filter.trim();
        if !filter.is_empty() {
            cmd.arg(filter);
        }
        cmd
    }
}

/// A running (or finished) capture process
pub struct CaptureSession {
    request: CaptureRequest,
    child: Child,
    drain: Option<JoinHandle<u64>>,
}

impl CaptureSession {
    pub fn interface(&self) -> &str {
        &self.request.interface
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Whether the process is still alive (reaps it if not)
    #[cfg(test)]
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Join the drain thread if it finishes shortly; detach it otherwise
    fn release_drain(&mut self) {
        let Some(handle) = self.drain.take() else {
            return;
        };
        let start = Instant::now();
        while !handle.is_finished() && start.elapsed() < DRAIN_GRACE {
            thread::sleep(POLL_INTERVAL);
        }
        if handle.is_finished() {
            if let Ok(bytes) = handle.join() {
                debug!(interface = %self.request.interface, bytes, "capture output drained");
            }
        } else {
            // A grandchild still holds the pipe open
            debug!(interface = %self.request.interface, "detaching capture drain thread");
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// How a capture process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited before it was asked to stop
    AlreadyExited(ExitStatus),
    /// Exited within the grace period after SIGTERM
    Terminated(ExitStatus),
    /// Ignored SIGTERM and had to be killed
    Killed,
}

impl StopOutcome {
    /// Whether the process went away on its own or on request
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopOutcome::Killed)
    }
}

/// Result of stopping one session
#[derive(Debug)]
pub struct StopReport {
    pub interface: String,
    pub pid: u32,
    pub result: Result<StopOutcome>,
}

/// Where live capture output is copied to
pub type LiveSink = fn() -> Box<dyn Write + Send>;

fn terminal() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}

/// Spawns and stops capture processes
pub struct CaptureSupervisor {
    launcher: Box<dyn CaptureLauncher>,
    stop_timeout: Duration,
    live_sink: LiveSink,
}

impl CaptureSupervisor {
    pub fn new(launcher: Box<dyn CaptureLauncher>) -> Self {
        Self {
            launcher,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            live_sink: terminal,
        }
    }

    /// Send live output somewhere other than the terminal
    pub fn live_sink(mut self, sink: LiveSink) -> Self {
        self.live_sink = sink;
        self
    }

    /// Set how long stop waits before killing
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Spawn a capture process for `request`
    pub fn start(&self, request: CaptureRequest) -> Result<CaptureSession> {
        let mut cmd = self.launcher.command(&request);
        cmd.stdin(Stdio::null());

        match &request.destination {
            Some(path) => {
                let file = File::create(path).map_err(|e| {
                    Error::Process(format!("cannot open capture file {}: {}", path.display(), e))
                })?;
                let file_err = file.try_clone()?;
                cmd.stdout(Stdio::from(file)).stderr(Stdio::from(file_err));
            }
            None => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::inherit());
            }
        }

        let mut child = cmd.spawn().map_err(|e| {
            Error::Process(format!(
                "failed to start {:?} on {}: {}",
                cmd.get_program(),
                request.interface,
                e
            ))
        })?;

        let drain = match child.stdout.take() {
            Some(stdout) => {
                let sink = (self.live_sink)();
                let spawned = thread::Builder::new()
                    .name(format!("capture-{}", request.interface))
                    .spawn(move || drain_into(stdout, sink));
                match spawned {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(Error::Process(format!("failed to start output drain: {}", e)));
                    }
                }
            }
            None => None,
        };

        match &request.destination {
            Some(path) => info!(
                interface = %request.interface,
                pid = child.id(),
                file = %path.display(),
                "capture started"
            ),
            None => info!(
                interface = %request.interface,
                pid = child.id(),
                "capture started (live output)"
            ),
        }

        Ok(CaptureSession {
            request,
            child,
            drain,
        })
    }

    /// Ask a capture to exit, waiting at most the stop timeout
    pub fn stop(&self, session: &mut CaptureSession) -> Result<StopOutcome> {
        let interface = session.request.interface.clone();
        let process_error = |e: io::Error| {
            Error::Process(format!("failed to wait on capture for {}: {}", interface, e))
        };

        if let Some(status) = session.child.try_wait().map_err(&process_error)? {
            session.release_drain();
            return Ok(StopOutcome::AlreadyExited(status));
        }

        let pid = Pid::from_raw(session.child.id() as i32);
        match kill(pid, Signal::SIGTERM) {
            // ESRCH: exited between the check and the signal, picked up below
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => {
                return Err(Error::Process(format!(
                    "failed to signal capture {} on {}: {}",
                    pid, session.request.interface, e
                )));
            }
        }

        let start = Instant::now();
        loop {
            if let Some(status) = session.child.try_wait().map_err(&process_error)? {
                session.release_drain();
                return Ok(StopOutcome::Terminated(status));
            }
            if start.elapsed() >= self.stop_timeout {
                warn!(
                    interface = %session.request.interface,
                    pid = pid.as_raw(),
                    timeout = ?self.stop_timeout,
                    "capture did not stop cleanly, killing"
                );
                let _ = session.child.kill();
                let _ = session.child.wait();
                session.release_drain();
                return Ok(StopOutcome::Killed);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Stop every session; one failure never prevents the others
    pub fn stop_all(&self, sessions: Vec<CaptureSession>) -> Vec<StopReport> {
        sessions
            .into_iter()
            .map(|mut session| {
                let pid = session.pid();
                let result = self.stop(&mut session);
                match &result {
                    Ok(outcome) => {
                        info!(interface = session.interface(), pid, ?outcome, "capture stopped")
                    }
                    Err(e) => {
                        warn!(
                            interface = session.interface(),
                            pid,
                            error = %e,
                            "failed to stop capture"
                        )
                    }
                }
                StopReport {
                    interface: session.interface().to_string(),
                    pid,
                    result,
                }
            })
            .collect()
    }
}

/// Copy `source` into `sink` line by line until end of stream
///
/// Sink errors are swallowed so the producer never blocks on a full pipe.
pub fn drain_into<R: Read, W: Write>(source: R, mut sink: W) -> u64 {
    let mut reader = BufReader::new(source);
    let mut line = Vec::with_capacity(256);
    let mut total = 0u64;
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(n) => {
                total += n as u64;
                let _ = sink.write_all(&line).and_then(|_| sink.flush());
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    total
}
