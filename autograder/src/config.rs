use crate::{
    config::project_section::ProjectSection,
    error::{Error, Result},
    grader::{Assignment, Project, multi_project::MultiProject},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, path::Path};

pub mod group_section;
pub mod project_section;

fn default_release() -> String {
    "0".to_string()
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
struct AssignmentConfigUnchecked {
    name: String,
    #[serde(default = "default_release")]
    release: String,
    projects: Vec<ProjectSection>,
}

/// The assignment file: a title and the projects to grade.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(try_from = "AssignmentConfigUnchecked")]
pub struct AssignmentConfig {
    name: String,
    release: String,
    projects: Vec<ProjectSection>,
}

impl AssignmentConfig {
    fn build(name: String, release: String, projects: Vec<ProjectSection>) -> std::result::Result<Self, String> {
        if projects.is_empty() {
            return Err("at least one project is expected".to_string());
        }
        let mut names = HashSet::new();
        if let Some(dup) = projects.iter().find(|p| !names.insert(p.name.as_str())) {
            return Err(format!("Duplicate project name: {:?}", dup.name));
        }
        for project in &projects {
            project.to_project().map_err(|e| e.to_string())?;
        }
        Ok(Self {
            name,
            release,
            projects,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("malformed assignment file: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Unable to read assignment file {:?}", path.display().to_string()), path, e))?;
        Self::from_json(&json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn release(&self) -> &str {
        &self.release
    }

    pub fn projects(&self) -> &[ProjectSection] {
        &self.projects
    }

    /// A single project is graded from the source directory itself; several
    /// projects each get a subdirectory named after them.
    pub fn build_assignment(&self) -> Result<Box<dyn Assignment>> {
        let mut projects = self
            .projects
            .iter()
            .map(ProjectSection::to_project)
            .collect::<Result<Vec<Project>>>()?;
        if projects.len() == 1
            && let Some(project) = projects.pop()
        {
            return Ok(Box::new(project));
        }
        Ok(Box::new(MultiProject::new(projects)?))
    }
}

impl TryFrom<AssignmentConfigUnchecked> for AssignmentConfig {
    type Error = String;

    fn try_from(value: AssignmentConfigUnchecked) -> std::result::Result<Self, Self::Error> {
        let AssignmentConfigUnchecked {
            name,
            release,
            projects,
        } = value;

        AssignmentConfig::build(name, release, projects)
    }
}
