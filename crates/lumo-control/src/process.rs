//! 外部进程会话
//!
//! 启动前让出两只手臂的串口，进程退出后（正常结束、崩溃或被停止）
//! 由独立的监视线程恢复监视器。输出按行收集到固定容量的环形缓冲区。

use crate::error::ControlError;
use crate::handoff::ArmHandoff;
use crate::lerobot::LerobotCommand;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// 输出缓冲行数
pub const LOG_CAPACITY: usize = 50;
/// `status()` 返回的最近行数
pub const STATUS_TAIL: usize = 20;
/// SIGINT 后等待退出的最长时间
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

const WATCH_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL: Duration = Duration::from_millis(50);

/// 进程状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub running: bool,
    /// 仅运行中时有值
    pub pid: Option<u32>,
    /// 退出码；被信号终止时为负的信号编号
    pub return_code: Option<i32>,
    pub log: Vec<String>,
    pub last_line: String,
}

struct Session {
    child: Child,
    pid: u32,
    exit: Option<ExitStatus>,
}

impl Session {
    /// 非阻塞地查询退出状态
    fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit.is_none() {
            match self.child.try_wait() {
                Ok(status) => self.exit = status,
                Err(e) => warn!("Failed to poll process {}: {}", self.pid, e),
            }
        }
        self.exit
    }
}

struct Shared {
    name: String,
    session: Mutex<Option<Session>>,
    log: Mutex<VecDeque<String>>,
}

impl Shared {
    fn push_line(&self, line: String) {
        let mut log = self.log.lock();
        if log.len() == LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(line);
    }
}

/// 受管理的外部进程
///
/// 同一时间最多运行一个子进程；再次 `start()` 会先停止旧进程。
pub struct ManagedProcess {
    shared: Arc<Shared>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ManagedProcess {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                session: Mutex::new(None),
                log: Mutex::new(VecDeque::with_capacity(LOG_CAPACITY)),
            }),
            watcher: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// 启动进程，返回 PID
    ///
    /// 顺序：停止旧进程并等待其监视线程恢复手臂 → `pause_all()` → 启动子进程。
    /// 启动失败时立即 `resume_all()`。
    pub fn start(
        &self,
        command: &LerobotCommand,
        handoff: Arc<dyn ArmHandoff>,
    ) -> Result<u32, ControlError> {
        self.stop()?;
        if let Some(handle) = self.watcher.lock().take()
            && handle.join().is_err()
        {
            error!("[{}] Exit watcher panicked", self.shared.name);
        }

        self.shared.log.lock().clear();
        handoff.pause_all();

        let mut child = match command
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("[{}] Start failed: {}", self.shared.name, e);
                self.shared.push_line(format!("ERROR: {e}"));
                handoff.resume_all();
                return Err(ControlError::Spawn {
                    program: command.program().display().to_string(),
                    source: e,
                });
            },
        };

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            self.spawn_drain(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_drain(stderr);
        }
        *self.shared.session.lock() = Some(Session {
            child,
            pid,
            exit: None,
        });

        let shared = self.shared.clone();
        let watcher_handoff = handoff.clone();
        let watcher = thread::Builder::new()
            .name(format!("lumo-{}-watch", self.shared.name))
            .spawn(move || watch_exit(shared, watcher_handoff));
        match watcher {
            Ok(handle) => *self.watcher.lock() = Some(handle),
            Err(e) => {
                // 无监视线程时停止子进程并立即恢复手臂
                error!("[{}] Failed to spawn exit watcher: {}", self.shared.name, e);
                let stopped = self.stop();
                handoff.resume_all();
                stopped?;
                return Err(ControlError::Io(e));
            },
        }

        info!("[{}] Started PID={} ({})", self.shared.name, pid, command);
        Ok(pid)
    }

    fn spawn_drain<R: Read + Send + 'static>(&self, stream: R) {
        let shared = self.shared.clone();
        let result = thread::Builder::new()
            .name(format!("lumo-{}-log", self.shared.name))
            .spawn(move || {
                for line in BufReader::new(stream).lines() {
                    match line {
                        Ok(line) => shared.push_line(line.trim_end().to_string()),
                        Err(e) => {
                            debug!("[{}] Output stream closed: {}", shared.name, e);
                            break;
                        },
                    }
                }
            });
        if let Err(e) = result {
            warn!("[{}] Failed to spawn output reader: {}", self.shared.name, e);
        }
    }

    /// 是否有子进程在运行
    pub fn running(&self) -> bool {
        self.shared
            .session
            .lock()
            .as_mut()
            .is_some_and(|s| s.poll_exit().is_none())
    }

    /// 停止子进程
    ///
    /// 先发送 SIGINT，等待至多 5 秒，仍未退出则强制结束。未运行时为空操作。
    pub fn stop(&self) -> Result<(), ControlError> {
        let pid = match self.shared.session.lock().as_mut() {
            Some(session) => {
                if session.poll_exit().is_some() {
                    return Ok(());
                }
                session.pid
            },
            None => return Ok(()),
        };

        interrupt(pid)?;
        let deadline = Instant::now() + STOP_TIMEOUT;
        while Instant::now() < deadline {
            if !self.running() {
                info!("[{}] Stopped", self.shared.name);
                return Ok(());
            }
            thread::sleep(STOP_POLL);
        }

        warn!(
            "[{}] PID={} ignored SIGINT for {:?}, killing",
            self.shared.name, pid, STOP_TIMEOUT
        );
        let mut guard = self.shared.session.lock();
        if let Some(session) = guard.as_mut()
            && session.poll_exit().is_none()
        {
            session.child.kill()?;
            session.exit = Some(session.child.wait()?);
        }
        info!("[{}] Killed", self.shared.name);
        Ok(())
    }

    /// 运行状态与最近输出
    pub fn status(&self) -> ProcessStatus {
        let (running, pid, return_code) = match self.shared.session.lock().as_mut() {
            Some(session) => {
                let exit = session.poll_exit();
                let running = exit.is_none();
                (running, running.then_some(session.pid), exit.and_then(exit_code))
            },
            None => (false, None, None),
        };

        let log = self.shared.log.lock();
        let tail: Vec<String> = log.iter().skip(log.len().saturating_sub(STATUS_TAIL)).cloned().collect();
        drop(log);
        ProcessStatus {
            running,
            pid,
            return_code,
            last_line: tail.last().cloned().unwrap_or_default(),
            log: tail,
        }
    }

    /// 等待子进程退出且手臂已恢复监视
    pub fn wait(&self) {
        if let Some(handle) = self.watcher.lock().take()
            && handle.join().is_err()
        {
            error!("[{}] Exit watcher panicked", self.shared.name);
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("[{}] Failed to stop on drop: {}", self.shared.name, e);
        }
        self.wait();
    }
}

/// 轮询子进程直到退出，然后恢复手臂
fn watch_exit(shared: Arc<Shared>, handoff: Arc<dyn ArmHandoff>) {
    loop {
        thread::sleep(WATCH_INTERVAL);
        let mut guard = shared.session.lock();
        let Some(session) = guard.as_mut() else {
            break;
        };
        if let Some(status) = session.poll_exit() {
            info!("[{}] PID={} exited ({})", shared.name, session.pid, status);
            break;
        }
    }
    handoff.resume_all();
    debug!("[{}] Arms handed back to monitors", shared.name);
}

#[cfg(unix)]
fn interrupt(pid: u32) -> Result<(), ControlError> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| ControlError::Signal {
        pid,
        message: "pid out of range".to_string(),
    })?;
    match kill(Pid::from_raw(raw), Signal::SIGINT) {
        Ok(()) => Ok(()),
        // 已退出但尚未回收
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(ControlError::Signal {
            pid,
            message: e.to_string(),
        }),
    }
}

#[cfg(not(unix))]
fn interrupt(_pid: u32) -> Result<(), ControlError> {
    // 没有 SIGINT，等待超时后强制结束
    Ok(())
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|signal| -signal))
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> Option<i32> {
    status.code()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingHandoff {
        events: Mutex<Vec<&'static str>>,
        resumes: AtomicUsize,
    }

    impl ArmHandoff for RecordingHandoff {
        fn pause_all(&self) {
            self.events.lock().push("pause");
        }

        fn resume_all(&self) {
            self.events.lock().push("resume");
            self.resumes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn shell(script: &str) -> LerobotCommand {
        LerobotCommand::custom("/bin/sh", ["-c", script])
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        cond()
    }

    #[test]
    fn test_exit_resumes_arms_and_keeps_output() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("teleop");

        let pid = process
            .start(&shell("echo first; echo second 1>&2; exit 3"), handoff.clone())
            .unwrap();
        assert!(pid > 0);
        process.wait();

        assert_eq!(*handoff.events.lock(), vec!["pause", "resume"]);
        let status = process.status();
        assert!(!status.running);
        assert_eq!(status.pid, None);
        assert_eq!(status.return_code, Some(3));
        assert!(wait_for(|| process.status().log.len() == 2));
        let status = process.status();
        assert!(status.log.contains(&"first".to_string()));
        assert!(status.log.contains(&"second".to_string()));
    }

    #[test]
    fn test_spawn_failure_resumes_immediately() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("record");

        let result = process.start(
            &LerobotCommand::custom("/nonexistent/lerobot-record", Vec::<String>::new()),
            handoff.clone(),
        );
        assert!(matches!(result, Err(ControlError::Spawn { .. })));
        assert_eq!(*handoff.events.lock(), vec!["pause", "resume"]);
        let status = process.status();
        assert!(!status.running);
        assert!(status.last_line.starts_with("ERROR:"));
    }

    #[test]
    fn test_log_ring_keeps_last_lines() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("teleop");
        process
            .start(&shell("i=0; while [ $i -lt 60 ]; do echo line$i; i=$((i+1)); done"), handoff)
            .unwrap();
        process.wait();

        assert!(wait_for(|| process.status().last_line == "line59"));
        let status = process.status();
        assert_eq!(status.log.len(), STATUS_TAIL);
        assert_eq!(status.log.first().map(String::as_str), Some("line40"));
        assert_eq!(process.shared.log.lock().len(), LOG_CAPACITY);
    }

    #[test]
    fn test_stop_interrupts_running_process() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("teleop");
        process.start(&shell("exec sleep 30"), handoff.clone()).unwrap();
        assert!(process.running());
        assert!(process.status().pid.is_some());

        process.stop().unwrap();
        assert!(!process.running());
        assert_eq!(process.status().return_code, Some(-2));
        assert!(wait_for(|| handoff.resumes.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_stop_kills_process_ignoring_sigint() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("record");
        process
            .start(&shell("trap '' INT; echo ready; exec sleep 30"), handoff.clone())
            .unwrap();
        assert!(wait_for(|| process.status().last_line == "ready"));

        let started = Instant::now();
        process.stop().unwrap();
        assert!(started.elapsed() >= STOP_TIMEOUT);
        assert!(!process.running());
        assert_eq!(process.status().return_code, Some(-9));
    }

    #[test]
    fn test_restart_stops_previous_and_resumes_before_pausing_again() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("teleop");
        process.start(&shell("exec sleep 30"), handoff.clone()).unwrap();
        process.start(&shell("exit 0"), handoff.clone()).unwrap();
        process.wait();

        assert_eq!(
            *handoff.events.lock(),
            vec!["pause", "resume", "pause", "resume"]
        );
    }

    #[test]
    fn test_stop_after_exit_keeps_return_code() {
        let handoff = Arc::new(RecordingHandoff::default());
        let process = ManagedProcess::new("teleop");
        process.start(&shell("exit 3"), handoff.clone()).unwrap();
        process.wait();

        process.stop().unwrap();
        assert_eq!(process.status().return_code, Some(3));
        assert_eq!(handoff.resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let process = ManagedProcess::new("teleop");
        process.stop().unwrap();
        let status = process.status();
        assert!(!status.running);
        assert_eq!(status.return_code, None);
        assert_eq!(status.last_line, "");
    }
}
