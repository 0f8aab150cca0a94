use serde::{Deserialize, Serialize};
use std::fmt;

/// Actions a principal can perform on a resource
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Update,
    Delete,
    Create,
}

impl Action {
    /// The universal action set, in display order
    pub fn all() -> Vec<Action> {
        vec![Action::Read, Action::Update, Action::Delete, Action::Create]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Create => "create",
        }
    }

    /// Parse from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Action> {
        match s.trim().to_lowercase().as_str() {
            "read" => Some(Action::Read),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            "create" => Some(Action::Create),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents either a specific action or the wildcard (*)
///
/// The wildcard is only meaningful for grant and revoke, where it expands to
/// the full ceiling for a resource and scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOrWildcard {
    Action(Action),
    Wildcard,
}

impl ActionOrWildcard {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<ActionOrWildcard> {
        if s.trim() == "*" {
            Some(ActionOrWildcard::Wildcard)
        } else {
            Action::from_str(s).map(ActionOrWildcard::Action)
        }
    }
}

impl fmt::Display for ActionOrWildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOrWildcard::Action(action) => f.write_str(action.as_str()),
            ActionOrWildcard::Wildcard => f.write_str("*"),
        }
    }
}

impl From<Action> for ActionOrWildcard {
    fn from(action: Action) -> Self {
        ActionOrWildcard::Action(action)
    }
}

/// Resources guarded by the authorization engine
///
/// `Notifications` is part of the vocabulary but carries no ceiling entry in
/// the built-in policy, so every check against it is rejected as an unknown
/// resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Announcements,
    Users,
    CourseMaterials,
    Notifications,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Announcements => "announcements",
            Resource::Users => "users",
            Resource::CourseMaterials => "course_materials",
            Resource::Notifications => "notifications",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Resource> {
        match s.trim().to_lowercase().as_str() {
            "announcements" => Some(Resource::Announcements),
            "users" => Some(Resource::Users),
            "course_materials" => Some(Resource::CourseMaterials),
            "notifications" => Some(Resource::Notifications),
            _ => None,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an action targets the acting principal's own data or someone else's
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Own,
    Others,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Own => "own",
            Scope::Others => "others",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Scope> {
        match s.trim().to_lowercase().as_str() {
            "own" => Some(Scope::Own),
            "others" => Some(Scope::Others),
            _ => None,
        }
    }

    /// Derive the scope of an action from the owner of its target.
    ///
    /// Without a concrete target (listing, creating) the scope is `Own`.
    pub fn derive<T: PartialEq + ?Sized>(actor: &T, owner: Option<&T>) -> Scope {
        match owner {
            Some(owner) if owner != actor => Scope::Others,
            _ => Scope::Own,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Roles, ordered from least to most privileged
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn all() -> Vec<Role> {
        vec![Role::Student, Role::Admin, Role::SuperAdmin]
    }

    /// The lowest-privilege role, subject to the floor rule
    pub fn lowest() -> Role {
        Role::Student
    }

    pub fn is_lowest(&self) -> bool {
        *self == Role::lowest()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            "super_admin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
