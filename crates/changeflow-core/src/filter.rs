use std::collections::HashSet;

use crate::{ObserveError, Result};

/// Joins a parent path and a property name with `.`; the root path is empty.
pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

/// Allow-list of root-relative dotted paths restricting which branches are observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathFilter {
    paths: HashSet<String>,
}

impl PathFilter {
    pub fn new<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = HashSet::new();
        for p in paths {
            let p = p.into();
            if p.split('.').any(|seg| seg.is_empty()) {
                return Err(ObserveError::InvalidPath(p));
            }
            set.insert(p);
        }
        Ok(Self { paths: set })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// First path segment of every entry reachable under `base`.
    ///
    /// An entry equal to `base` contributes nothing: it tracks `base` itself,
    /// not anything beneath it.
    pub fn child_segments(&self, base: &str) -> HashSet<String> {
        self.paths
            .iter()
            .filter_map(|entry| remainder(entry, base))
            .filter_map(|rest| rest.split('.').next())
            .filter(|seg| !seg.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The filter as seen by a subtree reported at `base` but addressed as
    /// `base.segment`.
    ///
    /// Entries under `base.segment` are lifted to `base`; other entries under
    /// `base` belong to sibling aspects and are dropped.
    pub fn lifted(&self, base: &str, segment: &str) -> PathFilter {
        let addressed = join_path(base, segment);
        let paths = self
            .paths
            .iter()
            .filter_map(|entry| match remainder(entry, &addressed) {
                Some("") => Some(base.to_string()),
                Some(rest) => Some(join_path(base, rest)),
                None if remainder(entry, base).is_some() => None,
                None => Some(entry.clone()),
            })
            .collect();
        PathFilter { paths }
    }
}

fn remainder<'a>(entry: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(entry);
    }
    let rest = entry.strip_prefix(base)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('.')
    }
}

/// The immediate child segments a node at some path is allowed to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackedSegments {
    All,
    Only(HashSet<String>),
}

impl TrackedSegments {
    pub fn for_path(filter: Option<&PathFilter>, base: &str) -> Self {
        match filter {
            None => TrackedSegments::All,
            Some(f) => TrackedSegments::Only(f.child_segments(base)),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        match self {
            TrackedSegments::All => true,
            TrackedSegments::Only(set) => set.contains(name),
        }
    }

    pub fn tracks_nothing(&self) -> bool {
        matches!(self, TrackedSegments::Only(set) if set.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifted_folds_segment_into_base() {
        let filter = PathFilter::new([
            "Main.Opacity.CurrentValue.X",
            "Main.Opacity.Animation.Duration",
            "Main.Name",
        ])
        .unwrap();
        let lifted = filter.lifted("Main.Opacity", "CurrentValue");

        assert!(lifted.contains("Main.Opacity.X"));
        assert!(lifted.contains("Main.Name"));
        assert!(!lifted.iter().any(|p| p.contains("Animation")));
        assert_eq!(
            lifted.child_segments("Main.Opacity"),
            HashSet::from(["X".to_string()])
        );
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join_path("", "Foo"), "Foo");
        assert_eq!(join_path("Foo", "Bar"), "Foo.Bar");
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(PathFilter::new(["Foo..Bar"]).is_err());
        assert!(PathFilter::new([".Foo"]).is_err());
        assert!(PathFilter::new([""]).is_err());
        assert!(PathFilter::new(["Foo.Bar"]).is_ok());
    }

    #[test]
    fn child_segments_under_root_and_nested() {
        let f = PathFilter::new(["Foo.Bar", "Foo.Baz.Qux", "Other"]).unwrap();
        let root = f.child_segments("");
        assert!(root.contains("Foo") && root.contains("Other"));
        assert_eq!(root.len(), 2);

        let foo = f.child_segments("Foo");
        assert!(foo.contains("Bar") && foo.contains("Baz"));
        assert_eq!(foo.len(), 2);

        assert!(f.child_segments("Other").is_empty());
    }

    #[test]
    fn prefix_must_end_on_segment_boundary() {
        let f = PathFilter::new(["FooBar.X"]).unwrap();
        assert!(f.child_segments("Foo").is_empty());
    }

    #[test]
    fn tracked_without_filter_allows_everything() {
        assert!(TrackedSegments::for_path(None, "A.B").allows("anything"));
        let f = PathFilter::new(["A.B"]).unwrap();
        let t = TrackedSegments::for_path(Some(&f), "A");
        assert!(t.allows("B"));
        assert!(!t.allows("C"));
    }

    #[test]
    fn empty_filter_tracks_nothing() {
        let f = PathFilter::new(Vec::<String>::new()).unwrap();
        assert!(!TrackedSegments::for_path(Some(&f), "").allows("X1"));
    }
}
