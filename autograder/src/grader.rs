pub mod assertions;
pub mod multi_project;
pub mod os_interface;
pub mod score;

use crate::error::{Error, Result};
use crate::input::UnpackedArchive;
use crate::report;
use grading_tests::TestGroup;
use is_executable::is_executable;
use log::{debug, error, info};
use os_interface::{DEFAULT_TIMEOUT, ProcessRunner, display_command};
use score::{Category, Score, ScoreBoard, Tally};
use std::{
    collections::HashSet,
    io::Write,
    path::Path,
    time::Duration,
};

/// Subdirectory of the sources holding the tests written by the student.
pub const USER_TESTS_DIR: &str = "test";

/// Knobs of one grading run.
#[derive(Debug, Default, PartialEq, Eq, Clone)]
pub struct GradingOptions {
    /// Below 0 hides diagnostics, 1 adds input and output of failed tests,
    /// 2 also reports passed tests. Never affects scoring.
    pub verbosity: i32,
    /// Project names or `<project>:<group>` names to grade. Empty means everything.
    pub requests: HashSet<String>,
}

/// Anything that can be graded into a list of scores.
pub trait Assignment {
    /// Grades the sources in `src_dir` against the fixtures in `data_dir`.
    ///
    /// Progress and test diagnostics are written to `out`. Only fatal errors
    /// are returned; a project that fails to build still yields its scores.
    fn get_scores(
        &self,
        src_dir: &Path,
        data_dir: &Path,
        options: &GradingOptions,
        out: &mut dyn Write,
    ) -> Result<Vec<Score>>;

    /// Grades and then prints the score tables.
    fn grade(&self, src_dir: &Path, data_dir: &Path, options: &GradingOptions, out: &mut dyn Write) -> Result<()> {
        let scores = self.get_scores(src_dir, data_dir, options, out)?;
        for score in &scores {
            debug!("Got score {score:?}");
        }
        report::write_report(&scores, out)?;
        Ok(())
    }

    /// Unpacks a tar archive to a temporary directory and grades `src_subdir` inside it.
    fn grade_archive(
        &self,
        archive: &Path,
        src_subdir: &Path,
        data_dir: &Path,
        options: &GradingOptions,
        out: &mut dyn Write,
    ) -> Result<()> {
        let unpacked = UnpackedArchive::unpack(archive)?;
        let src_dir = unpacked.src_dir(src_subdir)?;
        self.grade(&src_dir, data_dir, options, out)
    }
}

/// A program built from the student's sources and tested by one or more groups.
#[derive(Debug, PartialEq, Clone)]
pub struct Project {
    name: String,
    groups: Vec<TestGroup>,
    program: String,
    timeout: Duration,
    clean_command: Vec<String>,
    build_command: Vec<String>,
    user_group: Option<TestGroup>,
}

impl Project {
    /// Creates a project built with `make` whose program is named after it.
    ///
    /// The user tests group defaults to the kind of discovery of the first group.
    pub fn new(name: impl Into<String>, groups: Vec<TestGroup>) -> Result<Self> {
        let name = name.into();
        let Some(first) = groups.first() else {
            return Err(Error::Config(format!("project {name:?} has no test groups")));
        };

        let mut ids = HashSet::new();
        let duplicates: Vec<_> = groups.iter().filter(|g| !ids.insert(g.id())).map(|g| g.id()).collect();
        if !duplicates.is_empty() {
            return Err(Error::Config(format!("Duplicate test group ids: {duplicates:?}")));
        }
        if let Some(group) = groups.iter().find(|g| g.weight().is_nan() || g.weight() < 0.0) {
            return Err(Error::Config(format!(
                "invalid weight {} for group {:?}",
                group.weight(),
                group.qualified_name(&name)
            )));
        }

        let user_group = TestGroup::new(first.discovery().with_defaults()).with_category(Category::UserTests);
        Ok(Self {
            program: name.clone(),
            name,
            groups,
            timeout: DEFAULT_TIMEOUT,
            clean_command: vec!["make".to_string(), "clean".to_string()],
            build_command: vec!["make".to_string()],
            user_group: Some(user_group),
        })
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_clean_command(mut self, cmd: Vec<String>) -> Self {
        self.clean_command = cmd;
        self
    }

    pub fn with_build_command(mut self, cmd: Vec<String>) -> Self {
        self.build_command = cmd;
        self
    }

    /// Replaces the user tests group; its category is always [`Category::UserTests`].
    pub fn with_user_group(mut self, group: Option<TestGroup>) -> Self {
        self.user_group = group.map(|g| g.with_category(Category::UserTests));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn groups(&self) -> &[TestGroup] {
        &self.groups
    }

    pub fn user_group(&self) -> Option<&TestGroup> {
        self.user_group.as_ref()
    }

    /// Runs the clean and build commands inside `src_dir`, checking that the
    /// program disappears and then reappears.
    pub fn build(&self, src_dir: &Path) -> Result<()> {
        let runner = ProcessRunner::in_dir(src_dir);
        let artifact = src_dir.join(&self.program);

        runner.run_command(&self.clean_command)?;
        if artifact.exists() {
            return Err(Error::Build(format!(
                "not removed by \"{}\"",
                display_command(&self.clean_command)
            )));
        }

        runner.run_command(&self.build_command)?;
        if !artifact.exists() {
            return Err(Error::Build(format!(
                "not created by \"{}\"",
                display_command(&self.build_command)
            )));
        }
        if !is_executable(&artifact) {
            return Err(Error::Build(format!("{} is not executable", self.program)));
        }
        Ok(())
    }

    fn selected_groups(&self, requests: &HashSet<String>) -> Vec<&TestGroup> {
        if requests.is_empty() || requests.contains(&self.name) {
            return self.groups.iter().collect();
        }
        self.groups
            .iter()
            .filter(|g| g.name().is_some() && requests.contains(&g.qualified_name(&self.name)))
            .collect()
    }

    fn run_groups(
        &self,
        groups: &[&TestGroup],
        src_dir: &Path,
        data_dir: &Path,
        options: &GradingOptions,
        out: &mut dyn Write,
    ) -> Result<Vec<Score>> {
        let src_dir = src_dir.canonicalize()?;
        let data_dir = data_dir.canonicalize()?;

        self.build(&src_dir)?;

        let mut session = Session {
            project: self,
            runner: ProcessRunner::in_dir(&src_dir),
            program: format!("./{}", self.program),
            options,
            out,
            board: ScoreBoard::new(),
        };

        let mut num_tests = 0;
        for group in groups {
            num_tests += session.group_score(group, &data_dir)?;
        }

        let user_dir = src_dir.join(USER_TESTS_DIR);
        if let Some(user_group) = &self.user_group
            && user_dir.is_dir()
        {
            num_tests += session.group_score(user_group, &user_dir)?;
        }

        writeln!(session.out, "\n{}: {num_tests} tests complete", self.name)?;
        Ok(session.board.into_scores())
    }

    fn report_failure(&self, err: &Error, out: &mut dyn Write) -> Result<()> {
        error!("{} failed: {err}", self.name);
        writeln!(out, "\n{}: {err}", self.name)?;
        match err {
            Error::Io { path: Some(path), .. } => writeln!(out, "  {}", path.display())?,
            Error::Command { cmd, output, .. } => {
                if cmd.len() > 1 {
                    writeln!(out, "  arguments: {:?}", &cmd[1..])?;
                }
                if !output.is_empty() {
                    writeln!(out, "{output}")?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Discovers the tests of every group without running anything, so a broken
    /// submission still shows how many points it forfeited.
    fn fallback_scores(&self, data_dir: &Path, out: &mut dyn Write) -> Result<Vec<Score>> {
        let program = format!("./{}", self.program);
        let mut board = ScoreBoard::new();
        let discovered = self.groups.iter().try_for_each(|group| {
            let count = group.get_tests(&program, data_dir)?.len();
            board.add(
                group.category(),
                &group.qualified_name(&self.name),
                Tally::of(0, count) * group.weight(),
            );
            Ok::<_, Error>(())
        });

        match discovered {
            Ok(()) => Ok(board.into_scores()),
            Err(err) => {
                info!("{} failed again: {err}", self.name);
                writeln!(out, "\n{}: unable to determine number of tests", self.name)?;
                Ok(vec![])
            }
        }
    }
}

impl Assignment for Project {
    fn get_scores(
        &self,
        src_dir: &Path,
        data_dir: &Path,
        options: &GradingOptions,
        out: &mut dyn Write,
    ) -> Result<Vec<Score>> {
        info!("Grading {:?}", self.name);

        if !src_dir.is_dir() {
            info!("Source dir not found: {src_dir:?}");
            return Ok(vec![]);
        }
        if !data_dir.is_dir() {
            return Err(Error::Config(format!("Data directory not found: {data_dir:?}")));
        }

        debug!("Requests: {:?}", options.requests);
        let groups = self.selected_groups(&options.requests);
        if groups.is_empty() {
            return Ok(vec![]);
        }

        match self.run_groups(&groups, src_dir, data_dir, options, out) {
            Ok(scores) => return Ok(scores),
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => self.report_failure(&err, out)?,
        }
        self.fallback_scores(data_dir, out)
    }
}

/// State of a project while its groups run.
struct Session<'a> {
    project: &'a Project,
    runner: ProcessRunner,
    program: String,
    options: &'a GradingOptions,
    out: &'a mut dyn Write,
    board: ScoreBoard,
}

impl Session<'_> {
    /// Runs every test of `group` found in `test_dir`, returning how many ran.
    fn group_score(&mut self, group: &TestGroup, test_dir: &Path) -> Result<usize> {
        let project: &Project = self.project;
        let timeout = project.timeout;
        let project = project.name.as_str();
        let name = group.qualified_name(project);
        let verbosity = self.options.verbosity;

        let mut num_correct = 0;
        let mut num_tested = 0;
        for test in group.get_tests_with_timeout(&self.program, test_dir, timeout)? {
            num_tested += 1;
            let outcome = test.run(&self.runner)?;
            if outcome.passed {
                num_correct += 1;
                if verbosity < 2 {
                    continue;
                }
            }

            writeln!(self.out, "\n{project}: {}", outcome.comment)?;
            writeln!(self.out, "  called as {}", display_command(test.command()))?;
            if verbosity < 0 {
                continue;
            }
            for line in &outcome.errors {
                writeln!(self.out, "  {line}")?;
            }
            if verbosity < 1 {
                continue;
            }
            test.write_input(self.out)?;
            outcome.write_output(self.out)?;
        }

        let tally = Tally::of(num_correct, num_tested) * group.weight();
        info!(
            "Group {name}. Correct {num_correct}/{num_tested}. Score {}/{}",
            tally.given, tally.points
        );
        self.board.add(group.category(), &name, tally);
        Ok(num_tested)
    }
}
