use serde::{Deserialize, Serialize};

/// Display name used when the token carries none.
const DEFAULT_DISPLAY_NAME: &str = "User";

/// Role identifier carried in the token's `role` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperAdmin,
    Admin,
    User,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUPER_ADMIN" => Role::SuperAdmin,
            "ADMIN" => Role::Admin,
            "USER" => Role::User,
            _ => Role::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        Role::from(s.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-facing projection of the signed-in identity.
///
/// Built from token claims at login, then enriched with the backend's
/// `/profile/` response during cold-boot restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Profile {
    pub id: Option<i64>,
    pub name: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub role: Role,
    pub company_id: Option<i64>,
    pub company_name: Option<String>,
    pub email: Option<String>,
}

impl Profile {
    pub fn new(id: Option<i64>, name: Option<String>, role: Option<&str>) -> Self {
        Self {
            id,
            name: name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            role: role.map(Role::from).unwrap_or(Role::User),
            company_id: None,
            company_name: None,
            email: None,
        }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Overlay the authoritative backend profile. Absent fields keep the
    /// values decoded from the token.
    pub fn merge_remote(&mut self, remote: &RemoteProfile) {
        if let Some(ref name) = remote.user.name {
            if !name.trim().is_empty() {
                self.name = name.clone();
            }
        }
        if remote.user.email.is_some() {
            self.email = remote.user.email.clone();
        }
        if let Some(ref role) = remote.user.role {
            self.role = Role::from(role.as_str());
        }
        if let Some(ref company) = remote.company {
            if company.id.is_some() {
                self.company_id = company.id;
            }
            if company.name.is_some() {
                self.company_name = company.name.clone();
            }
        }
    }
}

/// Response from `GET /profile/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub user: RemoteUser,
    #[serde(default)]
    pub company: Option<RemoteCompany>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteUser {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteCompany {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}
