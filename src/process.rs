//! External program execution
//!
//! Children run with piped stdout and stderr. Both pipes are drained on reader
//! threads into an [`OutputSink`] until the child exits. There is no timeout: a
//! hung child blocks the caller.

use crate::error::ApiError;
use parking_lot::Mutex;
use std::env;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

const CHUNK_SIZE: usize = 8192;

/// Locate an executable by name on `PATH`, or check it directly when it contains a separator
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// Destination for a child's output streams
pub trait OutputSink: Send + Sync {
    fn stdout(&self, chunk: &[u8]) -> io::Result<()>;
    fn stderr(&self, chunk: &[u8]) -> io::Result<()>;
}

/// Fans child output out to an optional log and, per stream, to the console
pub struct Tee {
    log: Option<Mutex<Box<dyn Write + Send>>>,
    echo_stdout: bool,
    echo_stderr: bool,
}

impl Tee {
    /// A sink that discards everything
    pub fn new() -> Self {
        Self {
            log: None,
            echo_stdout: false,
            echo_stderr: false,
        }
    }

    /// Write both streams, interleaved, to a freshly created file
    pub fn to_file(path: &Path) -> Result<Self, ApiError> {
        let file = File::create(path).map_err(|e| ApiError::io(path, e))?;
        Ok(Self::new().with_log(file))
    }

    pub fn with_log(mut self, writer: impl Write + Send + 'static) -> Self {
        self.log = Some(Mutex::new(Box::new(writer)));
        self
    }

    pub fn echo_stdout(mut self, enabled: bool) -> Self {
        self.echo_stdout = enabled;
        self
    }

    pub fn echo_stderr(mut self, enabled: bool) -> Self {
        self.echo_stderr = enabled;
        self
    }

    fn log(&self, chunk: &[u8]) -> io::Result<()> {
        if let Some(log) = &self.log {
            let mut log = log.lock();
            log.write_all(chunk)?;
            log.flush()?;
        }
        Ok(())
    }
}

impl Default for Tee {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSink for Tee {
    fn stdout(&self, chunk: &[u8]) -> io::Result<()> {
        if self.echo_stdout {
            let mut out = io::stdout().lock();
            out.write_all(chunk)?;
            out.flush()?;
        }
        self.log(chunk)
    }

    fn stderr(&self, chunk: &[u8]) -> io::Result<()> {
        if self.echo_stderr {
            let mut err = io::stderr().lock();
            err.write_all(chunk)?;
            err.flush()?;
        }
        self.log(chunk)
    }
}

/// In-memory sink keeping the two streams apart
#[derive(Default)]
pub struct CaptureSink {
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout.lock()).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr.lock()).into_owned()
    }
}

impl OutputSink for CaptureSink {
    fn stdout(&self, chunk: &[u8]) -> io::Result<()> {
        self.stdout.lock().extend_from_slice(chunk);
        Ok(())
    }

    fn stderr(&self, chunk: &[u8]) -> io::Result<()> {
        self.stderr.lock().extend_from_slice(chunk);
        Ok(())
    }
}

fn drain(mut reader: impl Read, mut emit: impl FnMut(&[u8]) -> io::Result<()>) -> io::Result<()> {
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => emit(&buf[..n])?,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Human-readable exit description
pub fn describe_status(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => format!("terminated abnormally ({})", status),
    }
}

/// Run `argv` in `cwd`, streaming its output into `sink`, and wait for it to exit
pub fn run_command(
    argv: &[String],
    cwd: &Path,
    sink: &dyn OutputSink,
) -> Result<ExitStatus, ApiError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ApiError::ConfigError("Empty command line".to_string()))?;
    debug!(program = %program, args = ?args, cwd = %cwd.display(), "Spawning process");

    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                ApiError::ConfigError(format!("Executable not found: {}", program))
            }
            _ => ApiError::ExecutionError {
                program: program.clone(),
                status: format!("failed to start: {}", e),
            },
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (out_result, err_result) = std::thread::scope(|scope| {
        let out = scope.spawn(|| match stdout {
            Some(pipe) => drain(pipe, |chunk| sink.stdout(chunk)),
            None => Ok(()),
        });
        let err = scope.spawn(|| match stderr {
            Some(pipe) => drain(pipe, |chunk| sink.stderr(chunk)),
            None => Ok(()),
        });
        (out.join(), err.join())
    });

    let status = child.wait().map_err(|e| ApiError::ExecutionError {
        program: program.clone(),
        status: format!("wait failed: {}", e),
    })?;

    for result in [out_result, err_result] {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ApiError::io(cwd, e)),
            Err(_) => {
                return Err(ApiError::ExecutionError {
                    program: program.clone(),
                    status: "output reader panicked".to_string(),
                })
            }
        }
    }

    debug!(program = %program, status = %describe_status(&status), "Process exited");
    Ok(status)
}
