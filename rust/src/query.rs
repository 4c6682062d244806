//! Read-only lookups over the facts of one file.

use crate::analyzer::extractor::{Fact, FactKind};

#[derive(Debug, Clone, Copy)]
pub struct FactQuery<'a> {
    facts: &'a [Fact],
}

impl<'a> FactQuery<'a> {
    pub fn new(facts: &'a [Fact]) -> Self {
        Self { facts }
    }

    pub fn by_kind(&self, kind: FactKind) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(move |f| f.kind == kind)
    }

    pub fn classes(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        self.by_kind(FactKind::Class)
    }

    pub fn functions(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        self.by_kind(FactKind::Function)
    }

    pub fn methods(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        self.by_kind(FactKind::Method)
    }

    pub fn properties(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        self.by_kind(FactKind::Property)
    }

    /// Methods and properties whose name contains `needle`.
    pub fn methods_named(&self, needle: &'a str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(move |f| {
            matches!(f.kind, FactKind::Method | FactKind::Property) && f.name.contains(needle)
        })
    }

    /// Classes that declare at least one method or property directly.
    pub fn classes_with_methods(&self) -> Vec<&'a Fact> {
        let facts = self.facts;
        facts
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind == FactKind::Class)
            .filter(|&(index, _)| {
                facts.iter().any(|child| {
                    child.parent == Some(index)
                        && matches!(child.kind, FactKind::Method | FactKind::Property)
                })
            })
            .map(|(_, f)| f)
            .collect()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(|f| f.parent.is_none())
    }

    pub fn children_of(&self, index: usize) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(move |f| f.parent == Some(index))
    }

    pub fn find(&self, qualified_name: &str) -> Option<&'a Fact> {
        self.facts.iter().find(|f| f.qualified_name == qualified_name)
    }

    /// Facts carrying a decorator whose text is `name` or starts with `name(`.
    pub fn decorated_with(&self, name: &'a str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.facts.iter().filter(move |f| {
            f.decorators
                .iter()
                .any(|d| d == name || d.strip_prefix(name).is_some_and(|rest| rest.starts_with('(')))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::session::{extract, ExtractOptions};

    const SOURCE: &str = "\
class Empty:
    pass

class Service:
    @property
    def name(self):
        return 'svc'

    @retry(times=3)
    def fetch_all(self):
        def fetch_one():
            pass

def fetch():
    pass
";

    #[test]
    fn lookups() {
        let file = extract("svc.py", SOURCE, &ExtractOptions::default());
        let query = file.query();

        let names = |it: Vec<&Fact>| it.into_iter().map(|f| f.qualified_name.clone()).collect::<Vec<_>>();
        assert_eq!(names(query.classes().collect()), ["Empty", "Service"]);
        assert_eq!(names(query.classes_with_methods()), ["Service"]);
        assert_eq!(names(query.methods_named("fetch").collect()), ["Service.fetch_all"]);
        assert_eq!(names(query.top_level().collect()), ["Empty", "Service", "fetch"]);
        assert_eq!(
            names(query.children_of(1).collect()),
            ["Service.name", "Service.fetch_all"]
        );
        assert_eq!(names(query.decorated_with("retry").collect()), ["Service.fetch_all"]);
        assert_eq!(names(query.properties().collect()), ["Service.name"]);
        assert_eq!(
            query.find("Service.fetch_all.fetch_one").map(|f| f.kind),
            Some(FactKind::Function)
        );
        assert!(query.find("Missing").is_none());
    }
}
