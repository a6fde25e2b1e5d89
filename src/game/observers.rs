//! Observer groups: who must be told about an event, and where they see it

use super::location::RelativeLocation;
use super::UserId;

/// Bare set of user ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyGroup(pub Vec<UserId>);

impl NotifyGroup {
    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.0.contains(&user_id)
    }
}

/// One observer of an event with the event's position in the observer's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observer {
    pub user_id: UserId,
    pub relative: RelativeLocation,
}

/// Observers in scan order (row-major from the top left of the area)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatedGroup(pub Vec<Observer>);

impl LocatedGroup {
    pub fn user_ids(&self) -> NotifyGroup {
        NotifyGroup(self.0.iter().map(|o| o.user_id).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observer> {
        self.0.iter()
    }

    pub fn get(&self, user_id: UserId) -> Option<&Observer> {
        self.0.iter().find(|o| o.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for LocatedGroup {
    type Item = Observer;
    type IntoIter = std::vec::IntoIter<Observer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a LocatedGroup {
    type Item = &'a Observer;
    type IntoIter = std::slice::Iter<'a, Observer>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
