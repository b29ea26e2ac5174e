//! Authorized users and the identities linked to them.

use std::collections::HashMap;

use crate::config::UserConfig;

#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: Vec<UserConfig>,
    by_identity: HashMap<String, usize>,
}

impl UserDirectory {
    pub fn new(users: &[UserConfig]) -> Self {
        let users: Vec<UserConfig> = users.to_vec();
        let by_identity = users
            .iter()
            .enumerate()
            .flat_map(|(index, user)| {
                user.identities
                    .iter()
                    .map(move |identity| (identity.trim().to_string(), index))
            })
            .collect();
        Self { users, by_identity }
    }

    pub fn find(&self, identity: &str) -> Option<&UserConfig> {
        self.by_identity
            .get(identity)
            .and_then(|&index| self.users.get(index))
    }

    pub fn is_authorized(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn is_admin(&self, identity: &str) -> bool {
        self.find(identity).is_some_and(|user| user.admin)
    }

    /// Stable name used for quota accounting; falls back to the identity.
    pub fn account_name(&self, identity: &str) -> String {
        self.find(identity)
            .map_or_else(|| identity.to_string(), |user| user.name.clone())
    }

    /// Every identity linked to the same person, or just `identity`.
    pub fn linked_identities(&self, identity: &str) -> Vec<String> {
        self.find(identity).map_or_else(
            || vec![identity.to_string()],
            |user| user.identities.clone(),
        )
    }

    pub fn admins(&self) -> impl Iterator<Item = &UserConfig> {
        self.users.iter().filter(|user| user.admin)
    }

    /// Identities on `platform` (e.g. `telegram`), without the prefix.
    pub fn platform_ids<'a>(&'a self, platform: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.by_identity.keys().filter_map(move |identity| {
            identity
                .split_once(':')
                .filter(|(prefix, _)| *prefix == platform)
                .map(|(_, raw)| raw)
        })
    }
}
