//! Session-name and random-bucket group key sets

use crate::groupkeys::sets::{GroupKeySet, GroupKeySetRef};
use crate::groupkeys::GroupKey;

/// Grouping by dataset identity.
///
/// Each parent group fans out into one child per dataset in the query, in
/// a fixed order.
#[derive(Debug)]
pub struct SessionNameGroupKeySet {
    previous: GroupKeySetRef,
    session_names: Vec<String>,
}

impl SessionNameGroupKeySet {
    /// Build a session-name level over the given datasets
    pub fn new(previous: GroupKeySetRef, session_names: Vec<String>) -> Self {
        Self {
            previous,
            session_names,
        }
    }
}

impl GroupKeySet for SessionNameGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        1 + (group - 1) / self.session_names.len()
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group > self.num_groups() {
            return None;
        }
        let inner = (group - 1) % self.session_names.len();
        Some(GroupKey::StringTerm(self.session_names[inner].clone()))
    }

    fn num_groups(&self) -> usize {
        self.previous.num_groups() * self.session_names.len()
    }
}

/// Grouping by salted-hash bucket.
///
/// Bucket assignment happens remotely; locally the buckets are anonymous
/// numbered slots. The first slot of each fan-out is reserved for documents
/// with no term in the hashed field.
#[derive(Debug)]
pub struct RandomGroupKeySet {
    previous: GroupKeySetRef,
    num_buckets: usize,
}

impl RandomGroupKeySet {
    /// Build a random-bucket level with `num_buckets` slots per parent,
    /// including the reserved no-term slot
    pub fn new(previous: GroupKeySetRef, num_buckets: usize) -> Self {
        Self {
            previous,
            num_buckets,
        }
    }
}

impl GroupKeySet for RandomGroupKeySet {
    fn previous(&self) -> Option<&dyn GroupKeySet> {
        Some(self.previous.as_ref())
    }

    fn parent_group(&self, group: usize) -> usize {
        1 + (group - 1) / self.num_buckets
    }

    fn group_key(&self, group: usize) -> Option<GroupKey> {
        if group == 0 || group > self.num_groups() {
            return None;
        }
        let inner = (group - 1) % self.num_buckets;
        if inner == 0 {
            Some(GroupKey::StringTerm("No term".to_string()))
        } else {
            Some(GroupKey::IntTerm(inner as i64))
        }
    }

    fn num_groups(&self) -> usize {
        self.previous.num_groups() * self.num_buckets
    }
}
