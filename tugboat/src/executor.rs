use std::{
    io::{BufRead, BufReader, Read, Write},
    num::NonZeroI32,
    process::{Child, ExitStatus, Stdio},
    sync::mpsc,
    thread, time,
};

use log::{debug, error, info, log_enabled, warn};

use crate::{
    cancel::Cancellation,
    error::{Error, Result},
    process::{self, Command, ErrorKind},
};

const POLLING_INTERVAL: time::Duration = time::Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub source: Source,
    pub text: String,
}

/// Runs validated [`Command`]s, or only logs them when doing a dry run.
#[derive(Debug, Clone)]
pub struct Executor {
    dry_run: bool,
    debug: bool,
    cancellation: Cancellation,
    allowed_programs: &'static [&'static str],
}

impl Executor {
    pub fn new(dry_run: bool, debug: bool, cancellation: Cancellation) -> Self {
        Self {
            dry_run,
            debug,
            cancellation,
            allowed_programs: process::ALLOWED_PROGRAMS,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_allowed_programs(self, allowed_programs: &'static [&'static str]) -> Self {
        Self {
            allowed_programs,
            ..self
        }
    }

    /// Validates and starts `command`. The returned stream yields the combined stdout and stderr
    /// lines in arrival order and must be completed with [`OutputStream::finish`].
    pub fn execute(&self, command: &Command) -> Result<OutputStream> {
        process::validate_with(command, self.allowed_programs)?;

        if self.dry_run {
            info!("[dry-run] {command}");
            return Ok(OutputStream::empty(self));
        }

        self.cancellation.check()?;

        if log_enabled!(log::Level::Debug) {
            debug!("running `{command}`...");
        }

        let spawn_error = |error: std::io::Error| {
            Error::CommandExecutionFailed(process::Error {
                command: command.clone(),
                kind: error.into(),
            })
        };

        let mut child = std::process::Command::new(command.get_program())
            .args(command.get_args())
            .stdin(if command.get_stdin().is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        let (sender, receiver) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Source::Stdout, sender.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Source::Stderr, sender));
        }

        let mut stream = OutputStream {
            running: Some(Running {
                command: command.clone(),
                child,
                receiver,
                readers,
            }),
            debug: self.debug,
            cancellation: self.cancellation.clone(),
            stdout: String::new(),
            stderr: String::new(),
        };

        if let Some(input) = command.get_stdin() {
            if let Some(running) = stream.running.as_mut() {
                if let Some(mut stdin) = running.child.stdin.take() {
                    // Dropping `stdin` closes the pipe so the process sees EOF.
                    stdin.write_all(input).map_err(spawn_error)?;
                }
            }
        }

        Ok(stream)
    }

    /// Executes `command`, logs its output as it arrives and waits for it to finish.
    pub fn run(&self, command: &Command) -> Result<()> {
        let mut stream = self.execute(command)?;
        for line in stream.by_ref() {
            debug!("{}", line.text);
        }
        stream.finish()
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: R,
    source: Source,
    sender: mpsc::Sender<Line>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buffer)
                        .trim_end_matches(['\r', '\n'])
                        .to_owned();
                    if sender.send(Line { source, text }).is_err() {
                        break;
                    }
                }
            }
        }
    })
}

struct Running {
    command: Command,
    child: Child,
    receiver: mpsc::Receiver<Line>,
    readers: Vec<thread::JoinHandle<()>>,
}

impl Running {
    fn kill(&mut self) {
        if let Err(error) = self.child.kill() {
            debug!("failed to kill `{}`: {error}", self.command);
        }
        let _ = self.child.wait();
    }
}

/// The read-once output of a running command. Dropping the stream before calling
/// [`OutputStream::finish`] kills the process.
pub struct OutputStream {
    running: Option<Running>,
    debug: bool,
    cancellation: Cancellation,
    stdout: String,
    stderr: String,
}

impl OutputStream {
    fn empty(executor: &Executor) -> Self {
        Self {
            running: None,
            debug: executor.debug,
            cancellation: executor.cancellation.clone(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn record(&mut self, line: &Line) {
        let buffer = match line.source {
            Source::Stdout => &mut self.stdout,
            Source::Stderr => &mut self.stderr,
        };
        buffer.push_str(&line.text);
        buffer.push('\n');
    }

    fn wait(&mut self) -> Result<Option<ExitStatus>> {
        let Some(running) = self.running.as_mut() else {
            return Ok(None);
        };
        loop {
            if self.cancellation.is_cancelled() {
                warn!("cancelling `{}`", running.command);
                running.kill();
                return Err(Error::Cancelled);
            }
            match running.child.try_wait() {
                Ok(Some(status)) => return Ok(Some(status)),
                Ok(None) => thread::sleep(POLLING_INTERVAL),
                Err(error) => {
                    return Err(Error::CommandExecutionFailed(process::Error {
                        command: running.command.clone(),
                        kind: error.into(),
                    }))
                }
            }
        }
    }

    /// The lines reported when a command fails. Debug mode reports the exit code and all captured
    /// output, otherwise only stderr is shown.
    fn failure_report(&self, command: &Command, code: Option<NonZeroI32>) -> Vec<String> {
        let mut report = Vec::new();
        if self.debug {
            report.push(format!("Failure: `{command}`"));
            if let Some(code) = code {
                report.push(format!("Exit code: {code}"));
            }
            if !self.stderr.is_empty() {
                report.push(format!("STDERR\n****\n{}****", self.stderr));
            }
            if !self.stdout.is_empty() {
                report.push(format!("STDOUT\n****\n{}****", self.stdout));
            }
        } else if !self.stderr.is_empty() {
            report.push(self.stderr.trim_end().to_owned());
        }
        report
    }

    /// Drains any remaining output and waits for the process to exit.
    pub fn finish(mut self) -> Result<()> {
        for _ in self.by_ref() {}

        let Some(status) = self.wait()? else {
            return Ok(());
        };
        let Some(mut running) = self.running.take() else {
            return Ok(());
        };
        for reader in running.readers.drain(..) {
            let _ = reader.join();
        }
        // Lines sent between the last read and the reader threads exiting.
        while let Ok(line) = running.receiver.try_recv() {
            self.record(&line);
        }

        if status.success() {
            return Ok(());
        }

        let code = status.code().and_then(NonZeroI32::new);
        for line in self.failure_report(&running.command, code) {
            error!("{line}");
        }

        Err(Error::CommandExecutionFailed(process::Error {
            command: running.command,
            kind: ErrorKind::NonZeroExitStatus(code),
        }))
    }
}

impl Iterator for OutputStream {
    type Item = Line;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let running = self.running.as_ref()?;
            if self.cancellation.is_cancelled() {
                return None;
            }
            match running.receiver.recv_timeout(POLLING_INTERVAL) {
                Ok(line) => {
                    self.record(&line);
                    return Some(line);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if let Some(mut running) = self.running.take() {
            running.kill();
        }
    }
}
