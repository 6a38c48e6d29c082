use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt,
    ops::{AddAssign, Mul},
};

/// Top-level scoring bucket. The declaration order is the report order.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Points,
    ExtraCredit,
    UserTests,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Points, Category::ExtraCredit, Category::UserTests];

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Points => "Points",
            Category::ExtraCredit => "Extra credit",
            Category::UserTests => "User tests",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Final score of one group of one category.
#[derive(Debug, PartialEq, Clone)]
pub struct Score {
    pub category: Category,
    pub group: String,
    pub given: f64,
    pub points: f64,
}

/// Running `given`/`points` totals of a group while its tests execute.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Tally {
    pub given: f64,
    pub points: f64,
}

impl Tally {
    /// Unweighted tally of `correct` passing tests out of `tested`.
    pub fn of(correct: usize, tested: usize) -> Self {
        Self {
            given: correct as f64,
            points: tested as f64,
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, rhs: Self) {
        self.given += rhs.given;
        self.points += rhs.points;
    }
}

impl Mul<f64> for Tally {
    type Output = Tally;

    fn mul(self, rhs: f64) -> Self::Output {
        Tally {
            given: self.given * rhs,
            points: self.points * rhs,
        }
    }
}

/// Totals keyed by category and then by qualified group name.
///
/// Both levels are ordered maps, so [`ScoreBoard::into_scores`] yields the
/// categories in report order and the groups sorted by name.
#[derive(Debug, Default)]
pub struct ScoreBoard {
    totals: BTreeMap<Category, BTreeMap<String, Tally>>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, category: Category, group: &str, tally: Tally) {
        *self
            .totals
            .entry(category)
            .or_default()
            .entry(group.to_string())
            .or_default() += tally;
    }

    pub fn into_scores(self) -> Vec<Score> {
        self.totals
            .into_iter()
            .flat_map(|(category, groups)| {
                groups.into_iter().map(move |(group, tally)| Score {
                    category,
                    group,
                    given: tally.given,
                    points: tally.points,
                })
            })
            .collect()
    }
}
