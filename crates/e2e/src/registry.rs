//! Ordered collection of test definitions

use std::collections::{BTreeSet, HashMap};

use crate::definition::TestDefinition;
use crate::error::{HarnessError, HarnessResult};

/// Which tests of a registry a run should execute.
///
/// Empty `categories` and `tests` select everything; otherwise the union of
/// both is selected.
#[derive(Debug, Clone)]
pub struct Selection {
    pub categories: Vec<String>,
    pub tests: Vec<String>,
    /// Pull in transitive dependencies of the selected tests
    pub include_dependencies: bool,
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl Selection {
    pub fn all() -> Self {
        Self {
            categories: Vec::new(),
            tests: Vec::new(),
            include_dependencies: true,
        }
    }

    pub fn categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            ..Self::all()
        }
    }

    pub fn tests<I, S>(tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tests: tests.into_iter().map(Into::into).collect(),
            ..Self::all()
        }
    }

    pub fn with_dependencies(mut self, include: bool) -> Self {
        self.include_dependencies = include;
        self
    }

    pub fn is_all(&self) -> bool {
        self.categories.is_empty() && self.tests.is_empty()
    }
}

/// Test definitions in registry (concatenation) order.
///
/// Registry order is the tie-break for tests the dependency graph does not
/// order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tests: Vec<TestDefinition>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate groups in the given order
    pub fn from_groups<I>(groups: I) -> Self
    where
        I: IntoIterator<Item = Vec<TestDefinition>>,
    {
        let mut registry = Self::new();
        for group in groups {
            registry.extend(group);
        }
        registry
    }

    /// The full suite against the CRM API
    pub fn standard() -> Self {
        Self::from_groups(crate::suites::standard())
    }

    pub fn push(&mut self, test: TestDefinition) {
        self.tests.push(test);
    }

    pub fn extend(&mut self, tests: impl IntoIterator<Item = TestDefinition>) {
        self.tests.extend(tests);
    }

    pub fn all(&self) -> &[TestDefinition] {
        &self.tests
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&TestDefinition> {
        self.tests.iter().find(|t| t.id == id)
    }

    pub fn by_category(&self, category: &str) -> Vec<&TestDefinition> {
        self.tests.iter().filter(|t| t.category == category).collect()
    }

    /// Sorted, de-duplicated category names
    pub fn categories(&self) -> Vec<String> {
        self.tests
            .iter()
            .map(|t| t.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Map from id to registry position; the first occurrence wins
    pub(crate) fn index(&self) -> HashMap<&str, usize> {
        let mut index = HashMap::with_capacity(self.tests.len());
        for (i, test) in self.tests.iter().enumerate() {
            index.entry(test.id.as_str()).or_insert(i);
        }
        index
    }

    /// Registry positions selected by `selection`
    pub fn resolve(&self, selection: &Selection) -> HarnessResult<BTreeSet<usize>> {
        if selection.is_all() {
            return Ok((0..self.tests.len()).collect());
        }

        let index = self.index();
        let mut selected = BTreeSet::new();

        for category in &selection.categories {
            let members: Vec<usize> = self
                .tests
                .iter()
                .enumerate()
                .filter(|(_, t)| &t.category == category)
                .map(|(i, _)| i)
                .collect();
            if members.is_empty() {
                return Err(HarnessError::UnknownCategory(category.clone()));
            }
            selected.extend(members);
        }

        for id in &selection.tests {
            let position = index
                .get(id.as_str())
                .ok_or_else(|| HarnessError::UnknownSelection(id.clone()))?;
            selected.insert(*position);
        }

        if selection.include_dependencies {
            let mut stack: Vec<usize> = selected.iter().copied().collect();
            while let Some(position) = stack.pop() {
                for dep in &self.tests[position].depends_on {
                    if let Some(&dep_position) = index.get(dep.as_str()) {
                        if selected.insert(dep_position) {
                            stack.push(dep_position);
                        }
                    }
                }
            }
        }

        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::TestResponse;

    fn def(id: &str, category: &str, deps: &[&str]) -> TestDefinition {
        TestDefinition::new(id, id, category, |_ctx| {
            Box::pin(async { Ok(TestResponse::passed("ok")) })
        })
        .depends_on(deps.iter().copied())
    }

    fn sample() -> Registry {
        Registry::from_groups([
            vec![def("login", "setup", &[])],
            vec![
                def("contact-create", "contacts", &["login"]),
                def("contact-get", "contacts", &["contact-create"]),
            ],
            vec![def("offer-create", "offers", &["contact-create"])],
        ])
    }

    #[test]
    fn test_categories_sorted_unique() {
        assert_eq!(sample().categories(), vec!["contacts", "offers", "setup"]);
    }

    #[test]
    fn test_by_category_keeps_registry_order() {
        let registry = sample();
        let ids: Vec<&str> = registry
            .by_category("contacts")
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["contact-create", "contact-get"]);
        assert!(registry.by_category("nope").is_empty());
    }

    #[test]
    fn test_resolve_closes_over_dependencies() {
        let registry = sample();
        let selected = registry.resolve(&Selection::categories(["offers"])).unwrap();
        assert_eq!(selected.into_iter().collect::<Vec<_>>(), vec![0, 1, 3]);

        let without = registry
            .resolve(&Selection::categories(["offers"]).with_dependencies(false))
            .unwrap();
        assert_eq!(without.into_iter().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn test_resolve_rejects_unknown_names() {
        let registry = sample();
        assert!(matches!(
            registry.resolve(&Selection::categories(["billing"])),
            Err(HarnessError::UnknownCategory(c)) if c == "billing"
        ));
        assert!(matches!(
            registry.resolve(&Selection::tests(["missing"])),
            Err(HarnessError::UnknownSelection(id)) if id == "missing"
        ));
    }
}
