use tidemark_common::{Error, Result};

use crate::migration::{Direction, Version};
use crate::repository::{Catalog, MigrationFile};
use crate::tracker::AppliedSet;

/// Ordered migrations one invocation will execute. An empty plan means
/// nothing is pending, which is a successful no-op rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    steps: Vec<MigrationFile>,
}

impl Plan {
    pub fn new(steps: Vec<MigrationFile>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[MigrationFile] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MigrationFile> {
        self.steps.iter()
    }

    /// Version tokens in plan order.
    pub fn versions(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.version().as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a Plan {
    type Item = &'a MigrationFile;
    type IntoIter = std::slice::Iter<'a, MigrationFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

/// Decides which catalog entries to run given what has been applied.
pub struct Planner<'a> {
    catalog: &'a Catalog,
    applied: &'a AppliedSet,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog, applied: &'a AppliedSet) -> Self {
        Self { catalog, applied }
    }

    pub fn plan(&self, direction: Direction, target: Option<&Version>) -> Result<Plan> {
        match direction {
            Direction::Forward => self.forward(target),
            Direction::Reverse => self.reverse(target),
        }
    }

    /// Pending forward migrations in ascending order, up to and including
    /// `target` when given. The target must exist in the catalog.
    pub fn forward(&self, target: Option<&Version>) -> Result<Plan> {
        if let Some(target) = target
            && !self.catalog.contains(Direction::Forward, target)
        {
            return Err(Error::NotFound(format!(
                "no forward migration with version {target}"
            )));
        }

        let steps = self
            .catalog
            .entries(Direction::Forward)
            .iter()
            .filter(|f| !self.applied.contains(f.version()))
            .filter(|f| target.is_none_or(|t| f.version() <= t))
            .cloned()
            .collect();
        Ok(Plan::new(steps))
    }

    /// Without a target: the reverse sibling of the latest applied version.
    /// With a target: reverse siblings of every applied version >= target,
    /// newest first. Every selected version needs a reverse file.
    pub fn reverse(&self, target: Option<&Version>) -> Result<Plan> {
        let rows: Vec<_> = match target {
            None => self.applied.latest().into_iter().collect(),
            Some(target) => self.applied.newest_down_to(target).collect(),
        };

        let steps = rows
            .into_iter()
            .map(|row| self.reverse_sibling(&row.version).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Plan::new(steps))
    }

    /// Exactly the one migration matching `query` in `direction`.
    pub fn single(&self, direction: Direction, query: &str) -> Result<Plan> {
        let file = self.catalog.lookup(direction, query)?;
        Ok(Plan::new(vec![file.clone()]))
    }

    /// Roll back the latest applied version, then apply it again. Returns
    /// the reverse plan and the forward plan to run after it; both are empty
    /// when nothing is applied.
    pub fn remigrate(&self) -> Result<(Plan, Plan)> {
        let reverse = self.reverse(None)?;
        let Some(step) = reverse.steps().first() else {
            return Ok((Plan::default(), Plan::default()));
        };

        let forward = self
            .catalog
            .get(Direction::Forward, step.version())
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no forward migration with version {}",
                    step.version()
                ))
            })?;
        Ok((reverse.clone(), Plan::new(vec![forward.clone()])))
    }

    fn reverse_sibling(&self, version: &Version) -> Result<&'a MigrationFile> {
        self.catalog
            .get(Direction::Reverse, version)
            .ok_or_else(|| Error::NotFound(format!("no reverse migration for version {version}")))
    }
}
