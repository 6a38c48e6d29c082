use crate::config::group_section::GroupSection;
use crate::error::{Error, Result};
use crate::grader::Project;
use crate::grader::grading_tests::TestGroup;
use crate::grader::score::Category;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A command given either as a shell-like line or as an argument vector.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum CommandLine {
    Line(String),
    Args(Vec<String>),
}

impl CommandLine {
    pub fn to_args(&self) -> std::result::Result<Vec<String>, String> {
        let args = match self {
            CommandLine::Line(line) => {
                shlex::split(line).ok_or_else(|| format!("invalid command line: {line:?}"))?
            }
            CommandLine::Args(args) => args.clone(),
        };
        if args.is_empty() {
            return Err("commands cannot be empty".to_string());
        }
        Ok(args)
    }
}

fn default_user_tests() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
    /// Defaults to the project name.
    #[serde(default)]
    pub program: Option<String>,
    /// Per-test timeout in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub clean: Option<CommandLine>,
    #[serde(default)]
    pub build: Option<CommandLine>,
    #[serde(default = "default_user_tests")]
    pub user_tests: bool,
    pub groups: Vec<GroupSection>,
}

impl ProjectSection {
    pub fn to_project(&self) -> Result<Project> {
        let config_err = |msg: String| Error::Config(format!("project {:?}: {msg}", self.name));

        for group in &self.groups {
            group.validate().map_err(config_err)?;
        }
        let groups: Vec<TestGroup> = self.groups.iter().map(GroupSection::to_test_group).collect();
        let mut project = Project::new(&self.name, groups)?;

        if let Some(program) = &self.program {
            if program.is_empty() || program.contains('/') {
                return Err(config_err(format!("invalid program name {program:?}")));
            }
            project = project.with_program(program);
        }
        if let Some(timeout) = self.timeout {
            let timeout = Duration::try_from_secs_f64(timeout)
                .ok()
                .filter(|t| !t.is_zero())
                .ok_or_else(|| config_err(format!("invalid timeout {timeout}")))?;
            project = project.with_timeout(timeout);
        }
        if let Some(clean) = &self.clean {
            project = project.with_clean_command(clean.to_args().map_err(config_err)?);
        }
        if let Some(build) = &self.build {
            project = project.with_build_command(build.to_args().map_err(config_err)?);
        }
        if !self.user_tests {
            project = project.with_user_group(None);
        }
        Ok(project)
    }
}
