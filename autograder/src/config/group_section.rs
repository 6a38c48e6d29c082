use crate::grader::grading_tests::{Discovery, TestGroup};
use crate::grader::score::Category;
use serde::{Deserialize, Serialize};

fn default_weight() -> f64 {
    1.0
}

/// One test group of a project.
///
/// `category` can only be `points` or `extra_credit`; user tests are found by
/// convention, not configured.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct GroupSection {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub category: Category,
    pub tests: Discovery,
}

impl GroupSection {
    pub fn validate(&self) -> Result<(), String> {
        if self.category == Category::UserTests {
            return Err("the user_tests category cannot be assigned to a group".to_string());
        }
        Ok(())
    }

    pub fn to_test_group(&self) -> TestGroup {
        let mut group = TestGroup::new(self.tests.clone())
            .with_weight(self.weight)
            .with_category(self.category);
        if let Some(id) = &self.id {
            group = group.with_id(id);
        }
        if let Some(name) = &self.name {
            group = group.with_name(name);
        }
        group
    }
}
