use crate::error::{Error, Result};
use crate::grader::score::Score;
use crate::grader::{Assignment, GradingOptions, Project};
use std::{collections::HashSet, io::Write, path::Path};

/// Several independent projects, each graded from its own subdirectory of
/// the sources and of the fixtures.
#[derive(Debug, PartialEq, Clone)]
pub struct MultiProject {
    projects: Vec<Project>,
}

impl MultiProject {
    pub fn new(projects: Vec<Project>) -> Result<Self> {
        if projects.is_empty() {
            return Err(Error::Config("at least one project is expected".to_string()));
        }
        let mut names = HashSet::new();
        if let Some(dup) = projects.iter().find(|p| !names.insert(p.name())) {
            return Err(Error::Config(format!("Duplicate project name: {:?}", dup.name())));
        }
        Ok(Self { projects })
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }
}

impl Assignment for MultiProject {
    fn get_scores(
        &self,
        src_dir: &Path,
        data_dir: &Path,
        options: &GradingOptions,
        out: &mut dyn Write,
    ) -> Result<Vec<Score>> {
        let mut scores = vec![];
        for project in &self.projects {
            let src = src_dir.join(project.name());
            let data = data_dir.join(project.name());
            scores.extend(project.get_scores(&src, &data, options, out)?);
        }
        Ok(scores)
    }
}
