mod config;
mod error;
mod grader;
mod input;
mod report;

#[cfg(test)]
mod utils;

pub use config::AssignmentConfig;
pub use config::group_section::GroupSection;
pub use config::project_section::{CommandLine, ProjectSection};
pub use error::{Error, Result};
pub use grader::assertions::{Reference, Test, TestOutcome};
pub use grader::grading_tests::file_tests::FileTests;
pub use grader::grading_tests::learn_tests::LearnTests;
pub use grader::grading_tests::string_tests::StringTests;
pub use grader::grading_tests::{Discovery, TestGroup};
pub use grader::multi_project::MultiProject;
pub use grader::os_interface::{ProcessOutput, ProcessRunner, RunStatus};
pub use grader::score::{Category, Score};
pub use grader::{Assignment, GradingOptions, Project, USER_TESTS_DIR};
pub use input::UnpackedArchive;
pub use report::write_report;
