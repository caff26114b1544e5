use std::borrow::Borrow;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{AuthError, ConfigError};

/// Role identifier.
///
/// Roles are opaque names at this layer; their meaning is the rank assigned by
/// a [`RoleTable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Role {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable mapping from role name to rank. A higher rank implies all the
/// privileges of every lower rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTable {
    ranks: HashMap<Role, u32>,
}

impl RoleTable {
    /// Build a table. Ranks must be strictly positive; a later duplicate name
    /// overrides an earlier one.
    pub fn new<I, R>(ranks: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (R, u32)>,
        R: Into<Role>,
    {
        let mut table = HashMap::new();
        for (role, rank) in ranks {
            let role = role.into();
            if rank == 0 {
                return Err(ConfigError::InvalidRank(role.to_string()));
            }
            table.insert(role, rank);
        }
        Ok(Self { ranks: table })
    }

    pub fn rank(&self, role: &str) -> Result<u32, AuthError> {
        self.ranks
            .get(role)
            .copied()
            .ok_or_else(|| AuthError::UnknownRole(role.to_string()))
    }

    pub fn contains(&self, role: &str) -> bool {
        self.ranks.contains_key(role)
    }

    /// `rank(a) >= rank(b)`; both roles must be defined.
    pub fn at_least(&self, a: &str, b: &str) -> Result<bool, AuthError> {
        Ok(self.rank(a)? >= self.rank(b)?)
    }

    /// Whether a user holding `held` may act with `required`.
    ///
    /// `required` must be defined. A held role that is no longer in the table
    /// ranks below everything.
    pub fn satisfies(&self, held: &str, required: &str) -> Result<bool, AuthError> {
        let required = self.rank(required)?;
        Ok(self.ranks.get(held).is_some_and(|rank| *rank >= required))
    }

    /// Roles ordered by ascending rank, then name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        let mut roles: Vec<_> = self.ranks.iter().map(|(r, n)| (r.as_str(), *n)).collect();
        roles.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        roles.into_iter()
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}
