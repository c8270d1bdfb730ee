//! Runtime permission and visibility lists.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PermissionKind {
    PropertyRead,
    PropertyWrite,
    ServiceInvoke,
    EventInvoke,
    EventSubscribe,
}

impl PermissionKind {
    pub const ALL: [PermissionKind; 5] = [
        Self::PropertyRead,
        Self::PropertyWrite,
        Self::ServiceInvoke,
        Self::EventInvoke,
        Self::EventSubscribe,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PropertyRead => "PropertyRead",
            Self::PropertyWrite => "PropertyWrite",
            Self::ServiceInvoke => "ServiceInvoke",
            Self::EventInvoke => "EventInvoke",
            Self::EventSubscribe => "EventSubscribe",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrincipalType {
    User,
    Group,
}

impl PrincipalType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub principal_type: PrincipalType,
    pub is_permitted: bool,
}

/// A grant that appears twice for the same resource and permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionConflict {
    pub resource: String,
    pub kind: PermissionKind,
    pub principal: String,
    pub principal_type: PrincipalType,
}

impl fmt::Display for PermissionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' is given the {} permission more than once on '{}'",
            self.principal_type.name(),
            self.principal,
            self.kind.name(),
            self.resource
        )
    }
}

/// resource -> permission kind -> principals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionList {
    resources: IndexMap<String, IndexMap<PermissionKind, Vec<Principal>>>,
}

impl PermissionList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Adds one grant, failing if the principal already has an entry for it.
    pub fn grant(
        &mut self,
        resource: &str,
        kind: PermissionKind,
        principal: Principal,
    ) -> Result<(), PermissionConflict> {
        let principals = self
            .resources
            .entry(resource.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        let duplicate = principals
            .iter()
            .any(|p| p.name == principal.name && p.principal_type == principal.principal_type);
        if duplicate {
            return Err(PermissionConflict {
                resource: resource.to_string(),
                kind,
                principal: principal.name,
                principal_type: principal.principal_type,
            });
        }
        principals.push(principal);
        Ok(())
    }

    /// Deep-merges `other` into this list.
    pub fn merge(&mut self, other: PermissionList) -> Result<(), PermissionConflict> {
        for (resource, kinds) in other.resources {
            for (kind, principals) in kinds {
                for principal in principals {
                    self.grant(&resource, kind, principal)?;
                }
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<PermissionKind, Vec<Principal>>)> {
        self.resources.iter().map(|(r, k)| (r.as_str(), k))
    }

    /// Every grant as a flat, sorted tuple list; independent of insertion order.
    pub fn tuples(&self) -> Vec<(String, PermissionKind, PrincipalType, String, bool)> {
        let mut tuples: Vec<_> = self
            .resources
            .iter()
            .flat_map(|(resource, kinds)| {
                kinds.iter().flat_map(move |(kind, principals)| {
                    principals.iter().map(move |p| {
                        (resource.clone(), *kind, p.principal_type, p.name.clone(), p.is_permitted)
                    })
                })
            })
            .collect();
        tuples.sort();
        tuples
    }
}

/// Runtime permissions of an entity and of the things created from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionSet {
    pub runtime: PermissionList,
    pub instance: PermissionList,
}

impl PermissionSet {
    pub fn merge(&mut self, other: PermissionSet) -> Result<(), PermissionConflict> {
        self.runtime.merge(other.runtime)?;
        self.instance.merge(other.instance)
    }

    pub fn is_empty(&self) -> bool {
        self.runtime.is_empty() && self.instance.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityKind {
    Organization,
    OrganizationalUnit,
}

impl VisibilityKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Organization => "Organization",
            Self::OrganizationalUnit => "OrganizationalUnit",
        }
    }
}

/// An organization, or `Organization:Unit`, that may see an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityPrincipal {
    pub name: String,
    pub kind: VisibilityKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilitySet {
    pub runtime: Vec<VisibilityPrincipal>,
    pub instance: Vec<VisibilityPrincipal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, permitted: bool) -> Principal {
        Principal {
            name: name.to_string(),
            principal_type: PrincipalType::User,
            is_permitted: permitted,
        }
    }

    fn group(name: &str) -> Principal {
        Principal {
            name: name.to_string(),
            principal_type: PrincipalType::Group,
            is_permitted: true,
        }
    }

    #[test]
    fn test_merge_is_commutative_for_disjoint_grants() {
        let mut a = PermissionList::new();
        a.grant("*", PermissionKind::PropertyRead, user("alice", true)).unwrap();
        a.grant("speed", PermissionKind::PropertyWrite, group("Operators")).unwrap();

        let mut b = PermissionList::new();
        b.grant("*", PermissionKind::PropertyRead, user("bob", false)).unwrap();
        b.grant("run", PermissionKind::ServiceInvoke, user("alice", true)).unwrap();

        let mut ab = a.clone();
        ab.merge(b.clone()).unwrap();
        let mut ba = b.clone();
        ba.merge(a.clone()).unwrap();
        assert_eq!(ab.tuples(), ba.tuples());
        assert_eq!(ab.tuples().len(), 4);
    }

    #[test]
    fn test_merge_rejects_duplicate_grant() {
        let mut a = PermissionList::new();
        a.grant("*", PermissionKind::ServiceInvoke, user("alice", true)).unwrap();
        let mut b = PermissionList::new();
        b.grant("*", PermissionKind::ServiceInvoke, user("alice", false)).unwrap();

        let err = a.merge(b).unwrap_err();
        assert_eq!(err.principal, "alice");
        assert_eq!(err.kind, PermissionKind::ServiceInvoke);
    }

    #[test]
    fn test_same_name_different_type_is_not_a_conflict() {
        let mut a = PermissionList::new();
        a.grant("*", PermissionKind::EventInvoke, user("Admins", true)).unwrap();
        a.grant("*", PermissionKind::EventInvoke, group("Admins")).unwrap();
        assert_eq!(a.tuples().len(), 2);
    }
}
