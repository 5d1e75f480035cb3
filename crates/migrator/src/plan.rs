use std::collections::{BTreeSet, HashMap};

use cms_database::schema;
use cms_source::Collection;
use thiserror::Error;
use tracing::warn;

use crate::migrator::EntityMigrator;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("more than one migrator registered for {0}")]
    DuplicateMigrator(Collection),

    #[error("{collection} depends on {dependency}, which has no migrator")]
    UnknownDependency { collection: Collection, dependency: Collection },

    #[error("no migrator handles {0}")]
    UnknownCollection(Collection),

    #[error("dependency cycle among {0:?}")]
    Cycle(Vec<Collection>),
}

/// Migrators in an order where every dependency runs before its dependents.
pub struct MigrationPlan {
    migrators: Vec<Box<dyn EntityMigrator>>,
}

impl std::fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.collections()).finish()
    }
}

impl MigrationPlan {
    /// Every dependency must be registered.
    pub fn new(migrators: Vec<Box<dyn EntityMigrator>>) -> Result<Self, PlanError> {
        Self::build(migrators, false)
    }

    /// Dependencies outside `migrators` are assumed to be in place already.
    pub fn partial(migrators: Vec<Box<dyn EntityMigrator>>) -> Result<Self, PlanError> {
        Self::build(migrators, true)
    }

    /// Keeps only the migrators for `only`.
    pub fn select(migrators: Vec<Box<dyn EntityMigrator>>, only: &[Collection]) -> Result<Self, PlanError> {
        if let Some(missing) = only.iter().find(|c| !migrators.iter().any(|m| m.collection() == **c)) {
            return Err(PlanError::UnknownCollection(*missing));
        }
        let kept = migrators.into_iter().filter(|m| only.contains(&m.collection())).collect();
        Self::partial(kept)
    }

    fn build(migrators: Vec<Box<dyn EntityMigrator>>, allow_partial: bool) -> Result<Self, PlanError> {
        let mut index: HashMap<Collection, usize> = HashMap::new();
        for (i, m) in migrators.iter().enumerate() {
            if index.insert(m.collection(), i).is_some() {
                return Err(PlanError::DuplicateMigrator(m.collection()));
            }
        }

        let n = migrators.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, m) in migrators.iter().enumerate() {
            for dep in m.depends_on() {
                match index.get(dep) {
                    // self references are resolved within the same table
                    Some(&j) if j == i => {}
                    Some(&j) => {
                        in_degree[i] += 1;
                        dependents[j].push(i);
                    }
                    None if allow_partial => {
                        warn!("⚠️  {} depends on {}, which is not part of this run", m.collection(), dep);
                    }
                    None => {
                        return Err(PlanError::UnknownDependency { collection: m.collection(), dependency: *dep });
                    }
                }
            }
        }

        // Kahn's algorithm; among ready migrators the earliest registered goes first.
        let mut ready: BTreeSet<usize> = (0..n).filter(|i| in_degree[*i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_first() {
            order.push(i);
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.insert(d);
                }
            }
        }
        if order.len() < n {
            let stuck = (0..n)
                .filter(|i| in_degree[*i] > 0)
                .map(|i| migrators[i].collection())
                .collect();
            return Err(PlanError::Cycle(stuck));
        }

        let mut slots: Vec<Option<Box<dyn EntityMigrator>>> = migrators.into_iter().map(Some).collect();
        let migrators = order.into_iter().filter_map(|i| slots[i].take()).collect();
        Ok(Self { migrators })
    }

    pub fn migrators(&self) -> &[Box<dyn EntityMigrator>] {
        &self.migrators
    }

    pub fn collections(&self) -> Vec<Collection> {
        self.migrators.iter().map(|m| m.collection()).collect()
    }

    pub fn tables(&self) -> Vec<&'static str> {
        self.migrators.iter().map(|m| m.table()).collect()
    }

    /// Tables outside the plan with foreign keys into it. Truncating the
    /// plan's tables would cascade into these.
    pub fn external_dependents(&self) -> Vec<&'static str> {
        let tables = self.tables();
        let mut outside: Vec<&'static str> = Vec::new();
        for reference in schema::REFERENCES {
            if tables.contains(&reference.parent_table)
                && !tables.contains(&reference.table)
                && !outside.contains(&reference.table)
            {
                outside.push(reference.table);
            }
        }
        outside
    }

    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MigrationContext;
    use crate::entities;
    use crate::outcome::SkipReason;
    use cms_database::Row;
    use cms_source::SourceRecord;
    use uuid::Uuid;

    struct Fake(Collection, &'static [Collection]);

    impl EntityMigrator for Fake {
        fn collection(&self) -> Collection {
            self.0
        }

        fn table(&self) -> &'static str {
            self.0.as_str()
        }

        fn depends_on(&self) -> &'static [Collection] {
            self.1
        }

        fn transform(&self, _: &SourceRecord, _: Uuid, _: &mut MigrationContext) -> Result<Row, SkipReason> {
            Ok(Row::new())
        }
    }

    fn position(plan: &MigrationPlan, c: Collection) -> usize {
        plan.collections().iter().position(|x| *x == c).unwrap()
    }

    #[test]
    fn test_full_catalogue_orders_parents_first() {
        let plan = MigrationPlan::new(entities::all()).unwrap();
        assert_eq!(plan.len(), 22);
        for m in plan.migrators() {
            for dep in m.depends_on() {
                assert!(position(&plan, *dep) < position(&plan, m.collection()), "{} before {}", dep, m.collection());
            }
        }
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let plan = MigrationPlan::new(vec![
            Box::new(Fake(Collection::Students, &[Collection::Users])),
            Box::new(Fake(Collection::Calendars, &[])),
            Box::new(Fake(Collection::Users, &[])),
        ])
        .unwrap();
        assert_eq!(
            plan.collections(),
            vec![Collection::Calendars, Collection::Users, Collection::Students]
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = MigrationPlan::new(vec![
            Box::new(Fake(Collection::Users, &[Collection::Students])),
            Box::new(Fake(Collection::Students, &[Collection::Users])),
            Box::new(Fake(Collection::Calendars, &[])),
        ])
        .unwrap_err();
        assert_eq!(err, PlanError::Cycle(vec![Collection::Users, Collection::Students]));
    }

    #[test]
    fn test_unknown_dependency() {
        let migrators = || -> Vec<Box<dyn EntityMigrator>> {
            vec![Box::new(Fake(Collection::Students, &[Collection::Users]))]
        };
        assert_eq!(
            MigrationPlan::new(migrators()).unwrap_err(),
            PlanError::UnknownDependency { collection: Collection::Students, dependency: Collection::Users }
        );
        assert_eq!(MigrationPlan::partial(migrators()).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_and_select() {
        let err = MigrationPlan::new(vec![
            Box::new(Fake(Collection::Users, &[])),
            Box::new(Fake(Collection::Users, &[])),
        ])
        .unwrap_err();
        assert_eq!(err, PlanError::DuplicateMigrator(Collection::Users));

        let plan = MigrationPlan::select(entities::all(), &[Collection::Students, Collection::Users]).unwrap();
        assert_eq!(plan.collections(), vec![Collection::Users, Collection::Students]);
    }

    #[test]
    fn test_external_dependents() {
        assert!(MigrationPlan::new(entities::all()).unwrap().external_dependents().is_empty());

        let leaf = MigrationPlan::select(entities::all(), &[Collection::Calendars]).unwrap();
        assert!(leaf.external_dependents().is_empty());

        let students = MigrationPlan::select(entities::all(), &[Collection::Students]).unwrap();
        let outside = students.external_dependents();
        assert!(outside.contains(&schema::MENTOR_ASSIGNMENTS));
        assert!(outside.contains(&schema::INTERNSHIP_APPLICATIONS));
        assert!(!outside.contains(&schema::STUDENTS));
        assert!(!outside.contains(&schema::USERS));
    }
}
