//! Field-level change detection helpers

/// Per-field "differs" flags for one desired/existing pair
///
/// Fields keep the order in which the adapter recorded them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: Vec<(&'static str, bool)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, differs: bool) -> Self {
        self.set(field, differs);
        self
    }

    pub fn set(&mut self, field: &'static str, differs: bool) {
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = differs,
            None => self.fields.push((field, differs)),
        }
    }

    /// Whether `field` was recorded as changed. Unknown fields are unchanged.
    pub fn changed(&self, field: &str) -> bool {
        self.fields
            .iter()
            .any(|(name, differs)| *name == field && *differs)
    }

    pub fn any(&self) -> bool {
        self.fields.iter().any(|(_, differs)| *differs)
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|(_, differs)| *differs)
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> + '_ {
        self.fields.iter().copied()
    }
}

impl std::fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let changed = self.changed_fields();
        if changed.is_empty() {
            write!(f, "no changes")
        } else {
            write!(f, "{}", changed.join(", "))
        }
    }
}

/// Order-independent equality: sort both sides by `key`, then compare.
pub fn unordered_eq_by_key<T, K, F>(a: &[T], b: &[T], key: F) -> bool
where
    T: PartialEq,
    K: Ord,
    F: Fn(&T) -> K,
{
    if a.len() != b.len() {
        return false;
    }

    let mut left: Vec<&T> = a.iter().collect();
    let mut right: Vec<&T> = b.iter().collect();
    left.sort_by_key(|item| key(item));
    right.sort_by_key(|item| key(item));

    left == right
}

/// One step in reconciling an unordered child collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStep<'a, E, D> {
    Create(&'a D),
    Update(&'a E, &'a D),
    Delete(&'a E),
}

/// Diff an unordered child collection by identity.
///
/// Desired children are walked in order: a child with no existing
/// counterpart is created, one whose content differs is updated. Existing
/// children left unmatched are deleted afterwards, in existing order.
pub fn diff_children<'a, E, D, K, FE, FD, S>(
    existing: &'a [E],
    desired: &'a [D],
    existing_key: FE,
    desired_key: FD,
    same: S,
) -> Vec<ChildStep<'a, E, D>>
where
    K: PartialEq,
    FE: Fn(&E) -> K,
    FD: Fn(&D) -> K,
    S: Fn(&E, &D) -> bool,
{
    let mut steps = Vec::new();
    let mut matched = vec![false; existing.len()];

    for child in desired {
        let key = desired_key(child);
        let found = existing
            .iter()
            .enumerate()
            .find(|(idx, candidate)| !matched[*idx] && existing_key(candidate) == key);

        match found {
            Some((idx, current)) => {
                matched[idx] = true;
                if !same(current, child) {
                    steps.push(ChildStep::Update(current, child));
                }
            }
            None => steps.push(ChildStep::Create(child)),
        }
    }

    for (current, seen) in existing.iter().zip(&matched) {
        if !seen {
            steps.push(ChildStep::Delete(current));
        }
    }

    steps
}
