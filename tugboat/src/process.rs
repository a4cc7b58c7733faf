use std::{fmt, io, num::NonZeroI32};

/// The programs a [`Command`] may invoke.
pub const ALLOWED_PROGRAMS: &[&str] = &["docker"];

/// Characters that are never allowed in the arguments of a [`Command`].
pub const FORBIDDEN_CHARACTERS: &[char] = &[';', '|', '&'];

/// Describes an invocation of an external program. Commands are plain values, nothing is spawned
/// until they are handed to an [`crate::executor::Executor`].
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
    stdin: Option<Vec<u8>>,
}

impl Command {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes written to the standard input of the process. Never part of the rendered command.
    pub fn stdin(mut self, input: Vec<u8>) -> Self {
        self.stdin = Some(input);
        self
    }

    pub fn get_program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_stdin(&self) -> Option<&[u8]> {
        self.stdin.as_deref()
    }
}

fn needs_quotes(arg: &str) -> bool {
    arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | '\\'))
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if needs_quotes(arg) {
                write!(f, " {arg:?}")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{self}`")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("the `{0}` command is not allowed")]
    ProgramNotAllowed(String),

    #[error("the arguments contain the forbidden character {0:?}")]
    ForbiddenCharacter(char),
}

#[derive(Debug, thiserror::Error)]
#[error("refusing to run `{command}`: {reason}")]
pub struct CommandRejected {
    pub command: String,
    pub reason: RejectReason,
}

/// Checks `command` against [`ALLOWED_PROGRAMS`] and [`FORBIDDEN_CHARACTERS`].
pub fn validate(command: &Command) -> Result<(), CommandRejected> {
    validate_with(command, ALLOWED_PROGRAMS)
}

pub(crate) fn validate_with(command: &Command, allowed: &[&str]) -> Result<(), CommandRejected> {
    let reject = |reason| CommandRejected {
        command: command.to_string(),
        reason,
    };

    if !allowed.contains(&command.program.as_str()) {
        return Err(reject(RejectReason::ProgramNotAllowed(
            command.program.clone(),
        )));
    }

    let joined = command.args.join(" ");
    if let Some(c) = joined.chars().find(|c| FORBIDDEN_CHARACTERS.contains(c)) {
        return Err(reject(RejectReason::ForbiddenCharacter(c)));
    }

    Ok(())
}

#[derive(Debug)]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    NonZeroExitStatus(Option<NonZeroI32>),
    Io(io::Error),
}

impl From<io::Error> for ErrorKind {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::Io(value),
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub command: Command,
    pub kind: ErrorKind,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to run `{command}`: ", command = &self.command)?;
        let program = self.command.get_program();
        match &self.kind {
            ErrorKind::NotFound => {
                write!(
                    f,
                    "the `{program}` command is required but not available on your system, \
                     please install it"
                )
            }
            ErrorKind::PermissionDenied => {
                write!(
                    f,
                    "the `{program}` command is available but does not have the right \
                     permissions, please make sure the binary is executable"
                )
            }
            ErrorKind::NonZeroExitStatus(code) => {
                if let Some(code) = code {
                    write!(f, "exited with non-zero exit code `{code}`")
                } else {
                    write!(f, "did not run successfully")
                }
            }
            ErrorKind::Io(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Io(error) => Some(error),
            _ => None,
        }
    }
}

/// Creates a new [`Command`] and supplies the provided arguments, if any, while calling
/// [`std::convert::AsRef::as_ref`] on each.
macro_rules! command {
    ($program:expr $(,)?) => {
        $crate::process::Command::new($program)
    };
    ($program:expr, $($arg:expr),+ $(,)?) => {
        $crate::process::args!($crate::process::Command::new($program), $($arg,)*)
    };
}

/// Calls [`Command::args`] on the provided [`Command`] while calling
/// [`std::convert::AsRef::as_ref`] on each argument.
macro_rules! args {
    ($command:expr, $($arg:expr),+ $(,)?) => {
        $command.args([
            $(::std::convert::AsRef::<str>::as_ref(&$arg),)*
        ])
    }
}

pub(crate) use args;
pub(crate) use command;
