//! Term-based group key sets
//!
//! Built from the realized terms of a sorted field iteration. Fan-out
//! varies per parent, so these levels carry explicit per-group parent and
//! term arrays (index 0 unused). An optional per-group default mask marks
//! groups holding the shared "other terms" bucket instead of a single term.

use crate::error::{Error, Result};
use crate::groupkeys::sets::{GroupKeySet, GroupKeySetRef};
use crate::groupkeys::GroupKey;

fn check_lengths(terms_len: usize, parents_len: usize, mask: Option<&Vec<bool>>) -> Result<()> {
    if terms_len != parents_len {
        return Err(Error::invalid_argument(format!(
            "term array length {} does not match parent array length {}",
            terms_len, parents_len
        )));
    }
    if terms_len == 0 {
        return Err(Error::invalid_argument(
            "term array must include the unused index 0",
        ));
    }
    if let Some(mask) = mask {
        if mask.len() != terms_len {
            return Err(Error::invalid_argument(format!(
                "default mask length {} does not match term array length {}",
                mask.len(),
                terms_len
            )));
        }
    }
    Ok(())
}

/// Grouping by realized integer terms
#[derive(Debug)]
pub struct IntTermGroupKeySet {
    previous: GroupKeySetRef,
    terms: Vec<i64>,
    parent_groups: Vec<usize>,
    default_mask: Option<Vec<bool>>,
}

impl IntTermGroupKeySet {
    /// Build from per-group term and parent arrays, index 0 unused. A
    /// `default_mask` entry of true replaces that group's term with the
    /// shared default key.
    pub fn new(
        previous: GroupKeySetRef,
        terms: Vec<i64>,
        parent_groups: Vec<usize>,
        default_mask: Option<Vec<bool>>,
    ) -> Result<Self> {
        check_lengths(terms.len(), parent_groups.len(), default_mask.as_ref())?;
        Ok(Self {
            previous,
            terms,
            parent_groups,
            default_mask,
        })
    }
}

impl GroupKeySet for IntTermGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        self.parent_groups.get(group).copied().unwrap_or(0)
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group >= self.terms.len() {
            return None;
        }
        if let Some(mask) = &self.default_mask {
            if mask[group] {
                return Some(GroupKey::Default);
            }
        }
        Some(GroupKey::IntTerm(self.terms[group]))
    }

    fn num_groups(&self) -> usize {
        self.terms.len() - 1
    }
}

/// Grouping by realized string terms
#[derive(Debug)]
pub struct StringTermGroupKeySet {
    previous: GroupKeySetRef,
    terms: Vec<String>,
    parent_groups: Vec<usize>,
    default_mask: Option<Vec<bool>>,
}

impl StringTermGroupKeySet {
    /// Build from per-group term and parent arrays, index 0 unused.
    pub fn new(
        previous: GroupKeySetRef,
        terms: Vec<String>,
        parent_groups: Vec<usize>,
        default_mask: Option<Vec<bool>>,
    ) -> Result<Self> {
        check_lengths(terms.len(), parent_groups.len(), default_mask.as_ref())?;
        Ok(Self {
            previous,
            terms,
            parent_groups,
            default_mask,
        })
    }
}

impl GroupKeySet for StringTermGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        self.parent_groups.get(group).copied().unwrap_or(0)
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group >= self.terms.len() {
            return None;
        }
        if let Some(mask) = &self.default_mask {
            if mask[group] {
                return Some(GroupKey::Default);
            }
        }
        Some(GroupKey::StringTerm(self.terms[group].clone()))
    }

    fn num_groups(&self) -> usize {
        self.terms.len() - 1
    }
}
