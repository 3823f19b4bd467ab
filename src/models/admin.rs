//! Admin accounts backing the `admins` CLI verb
//!
//! The control plane proper keeps admins in its database; this crate only
//! needs the branding overrides and a small file-backed book for the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub username: String,
    /// Overrides the default `support-url` response header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    /// Overrides the default `profile-title` response header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_title: Option<String>,
    /// Aggregate traffic of this admin's users, reset by `--reset-usage`.
    #[serde(default)]
    pub users_usage: u64,
}

/// JSON-file backed admin collection.
#[derive(Debug)]
pub struct AdminBook {
    path: PathBuf,
    admins: Vec<Admin>,
}

impl AdminBook {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let admins = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_json::from_str(&raw)?
        } else {
            Vec::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            admins,
        })
    }

    pub fn list(&self) -> &[Admin] {
        &self.admins
    }

    pub fn create(&mut self, username: &str) -> Result<(), ConfigError> {
        if self.admins.iter().any(|a| a.username == username) {
            return Err(ConfigError::Invalid(format!(
                "Admin '{}' already exists",
                username
            )));
        }
        self.admins.push(Admin {
            username: username.to_string(),
            support_url: None,
            profile_title: None,
            users_usage: 0,
        });
        self.save()
    }

    pub fn delete(&mut self, username: &str) -> Result<(), ConfigError> {
        let before = self.admins.len();
        self.admins.retain(|a| a.username != username);
        if self.admins.len() == before {
            return Err(ConfigError::Invalid(format!(
                "Admin '{}' not found",
                username
            )));
        }
        self.save()
    }

    pub fn modify(
        &mut self,
        username: &str,
        support_url: Option<String>,
        profile_title: Option<String>,
    ) -> Result<(), ConfigError> {
        let admin = self
            .admins
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or_else(|| ConfigError::Invalid(format!("Admin '{}' not found", username)))?;
        if support_url.is_some() {
            admin.support_url = support_url;
        }
        if profile_title.is_some() {
            admin.profile_title = profile_title;
        }
        self.save()
    }

    pub fn reset_usage(&mut self, username: &str) -> Result<(), ConfigError> {
        let admin = self
            .admins
            .iter_mut()
            .find(|a| a.username == username)
            .ok_or_else(|| ConfigError::Invalid(format!("Admin '{}' not found", username)))?;
        admin.users_usage = 0;
        self.save()
    }

    fn save(&self) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(&self.admins)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}
