use crate::error::{Error, Result};
use crate::grader::os_interface::{DEFAULT_TIMEOUT, ProcessRunner, RunStatus};
use log::{debug, info, warn};
use std::{
    fmt::Write as _,
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

pub const CORRECT: &str = "correct";
pub const TIMED_OUT: &str = "timed out";
pub const UNEXPECTED_RETURN_CODE: &str = "unexpected return code";
pub const INCORRECT_OUTPUT: &str = "incorrect output";
pub const MISSING_REFERENCE: &str = "missing reference output";

/// Where the expected output of a test comes from.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Reference {
    Literal(String),
    /// Read when the test is checked, not when it is discovered.
    File(PathBuf),
}

/// One test case: a command line and what it is expected to produce.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Test {
    command: Vec<String>,
    expected_code: i32,
    timeout: Duration,
    reference: Reference,
    input_file: Option<PathBuf>,
}

/// Verdict of a test along with what was observed while running it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TestOutcome {
    pub passed: bool,
    pub comment: &'static str,
    pub output: String,
    pub status: RunStatus,
    pub errors: Vec<String>,
}

impl Test {
    pub fn new(command: Vec<String>, reference: Reference) -> Self {
        Self {
            command,
            expected_code: 0,
            timeout: DEFAULT_TIMEOUT,
            reference,
            input_file: None,
        }
    }

    pub fn literal(command: Vec<String>, expected: impl Into<String>) -> Self {
        Self::new(command, Reference::Literal(expected.into()))
    }

    pub fn from_file(command: Vec<String>, reference_file: impl Into<PathBuf>) -> Self {
        Self::new(command, Reference::File(reference_file.into()))
    }

    pub fn with_expected_code(mut self, code: i32) -> Self {
        self.expected_code = code;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Records the file the program reads, so it can be shown when the test fails.
    pub fn with_input_file(mut self, input_file: impl Into<PathBuf>) -> Self {
        self.input_file = Some(input_file.into());
        self
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn input_file(&self) -> Option<&Path> {
        self.input_file.as_deref()
    }

    /// The expected output, with trailing whitespace removed.
    pub fn reference_output(&self) -> Result<String> {
        match &self.reference {
            Reference::Literal(expected) => Ok(expected.trim_end().to_string()),
            Reference::File(path) => {
                debug!("Opening reference file {path:?}");
                let content = fs::read_to_string(path).map_err(|err| {
                    Error::io(
                        format!("Unable to open reference file {}: {err}", repr(&path.to_string_lossy())),
                        path,
                        err,
                    )
                })?;
                Ok(content.trim_end().to_string())
            }
        }
    }

    /// Executes the test and decides its verdict.
    ///
    /// Returns an error only when the program could not be launched at all.
    pub fn run(&self, runner: &ProcessRunner) -> Result<TestOutcome> {
        info!("Running test {:?}", self.command);
        let result = runner.run(&self.command, None, self.timeout).map_err(|err| {
            let program = self.command.first().map(String::as_str).unwrap_or_default();
            Error::io(format!("{program}: {err}"), program, err)
        })?;

        let mut outcome = TestOutcome {
            passed: false,
            comment: CORRECT,
            output: result.output,
            status: result.status,
            errors: vec![],
        };

        match result.status {
            RunStatus::Killed => outcome.comment = TIMED_OUT,
            RunStatus::Exited(code) if code != self.expected_code => {
                outcome.comment = UNEXPECTED_RETURN_CODE;
                outcome
                    .errors
                    .push(format!("expected return code {}, received {code}", self.expected_code));
            }
            RunStatus::Exited(_) => match self.reference_output() {
                Ok(reference) => {
                    outcome.errors = compare_output(&reference, &outcome.output);
                    if outcome.errors.is_empty() {
                        outcome.passed = true;
                    } else {
                        outcome.comment = INCORRECT_OUTPUT;
                    }
                }
                Err(err) => {
                    warn!("{err}");
                    outcome.comment = MISSING_REFERENCE;
                    outcome.errors.push(err.to_string());
                }
            },
        }

        if let Reference::File(path) = &self.reference
            && !outcome.passed
            && matches!(outcome.status, RunStatus::Exited(0))
        {
            outcome
                .errors
                .insert(0, format!("reference file: {}", repr(&path.to_string_lossy())));
        }

        debug!("Verdict for {:?}: {}", self.command, outcome.comment);
        Ok(outcome)
    }

    /// Prints the content of the input file, if the test has one.
    pub fn write_input(&self, out: &mut dyn Write) -> Result<()> {
        let Some(path) = &self.input_file else {
            return Ok(());
        };
        debug!("Opening input file {path:?}");
        let input = fs::read_to_string(path).map_err(|err| {
            Error::io(
                format!("Unable to open input file {}: {err}", path.display()),
                path,
                err,
            )
        })?;
        writeln!(out, "\ninput\n-----\n{}\n-----", input.trim_end())?;
        Ok(())
    }
}

impl TestOutcome {
    pub fn write_output(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "\noutput\n------\n{}\n------", self.output)?;
        Ok(())
    }
}

/// Compares `output` against `reference` line by line.
///
/// Every differing or missing line is reported. Output longer than the
/// reference yields a single "extra lines in output" entry, after which
/// nothing else is compared.
pub fn compare_output(reference: &str, output: &str) -> Vec<String> {
    let reference: Vec<&str> = reference.split('\n').collect();
    let output: Vec<&str> = output.split('\n').collect();

    let mut errors = vec![];
    for i in 0..reference.len().max(output.len()) {
        match (reference.get(i), output.get(i)) {
            (Some(expected), None) => errors.extend([
                format!("line {}", i + 1),
                format!("  expected: {}", repr(expected)),
                "  received nothing".to_string(),
            ]),
            (None, Some(_)) => {
                errors.push("extra lines in output".to_string());
                break;
            }
            (Some(expected), Some(received)) if expected != received => errors.extend([
                format!("line {}", i + 1),
                format!("  expected: {}", repr(expected)),
                format!("  received: {}", repr(received)),
            ]),
            _ => {}
        }
    }
    errors
}

/// Quotes a line so that invisible differences (tabs, trailing spaces, quotes)
/// show up in diagnostics.
pub fn repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };

    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push(quote);
    for c in s.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if c.is_control() && (c as u32) <= 0xff => {
                let _ = write!(quoted, "\\x{:02x}", c as u32);
            }
            c if c.is_control() => {
                let _ = write!(quoted, "\\u{:04x}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}
