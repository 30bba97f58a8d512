use std::{collections::HashMap, fmt, path::PathBuf};

use serde::Deserialize;
use snafu::{OptionExt as _, ResultExt as _, Snafu};
use tracing::{debug, warn};

const ACCESS_KEY_ID_VAR: &str = "CIRRUS_ACCESS_KEY_ID";
const SECRET_ACCESS_KEY_VAR: &str = "CIRRUS_SECRET_ACCESS_KEY";

/// Credentials error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum CredentialsError {
    /// A profile was requested, but no profiles file is configured.
    #[snafu(display("No profiles file configured."))]
    NoProfilesFile,

    /// The profiles file could not be read.
    #[snafu(display("Failed to read profiles file '{}'.", path.display()))]
    Io {
        /// Path to the profiles file.
        path: PathBuf,

        /// Error source.
        source: std::io::Error,
    },

    /// The profiles file is not valid YAML, or doesn't map profile names to credentials.
    #[snafu(display("Failed to parse profiles file '{}'.", path.display()))]
    Parse {
        /// Path to the profiles file.
        path: PathBuf,

        /// Error source.
        source: serde_yaml::Error,
    },

    /// The requested profile is not in the profiles file.
    #[snafu(display("Profile '{}' not found in '{}'.", profile, path.display()))]
    ProfileNotFound {
        /// Name of the requested profile.
        profile: String,

        /// Path to the profiles file.
        path: PathBuf,
    },
}

/// Backend credentials.
#[derive(Clone, Deserialize, Eq, PartialEq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    /// Creates a new `Credentials`.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Returns the access key ID.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Returns the secret access key.
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Where resolved credentials came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CredentialSource {
    /// A named profile in the profiles file.
    Profile(String),

    /// The `CIRRUS_ACCESS_KEY_ID` and `CIRRUS_SECRET_ACCESS_KEY` environment variables.
    Ambient,

    /// No credentials were found.
    Anonymous,
}

/// Credentials configuration.
///
/// Credentials are resolved in order from a named profile, then from the environment. If neither yields credentials,
/// requests are sent without authentication.
///
/// The profiles file is YAML, mapping profile names to credentials:
///
/// ```yaml
/// production:
///   access_key_id: AKID
///   secret_access_key: secret
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CredentialsConfiguration {
    /// Name of the profile to use.
    #[serde(default)]
    pub profile: Option<String>,

    /// Path to the profiles file.
    #[serde(default)]
    pub profiles_file: Option<PathBuf>,
}

impl CredentialsConfiguration {
    /// Resolves credentials, reading ambient credentials from the process environment.
    pub fn resolve(&self) -> (Option<Credentials>, CredentialSource) {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves credentials, reading ambient credentials through `lookup_env`.
    pub fn resolve_with<F>(&self, lookup_env: F) -> (Option<Credentials>, CredentialSource)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(profile) = &self.profile {
            match self.load_profile(profile) {
                Ok(credentials) => {
                    debug!(profile = profile.as_str(), "Using credentials from profile.");
                    return (Some(credentials), CredentialSource::Profile(profile.clone()));
                }
                Err(e) => warn!(
                    profile = profile.as_str(),
                    error = %e,
                    "Failed to resolve credential profile. Falling back to ambient credentials."
                ),
            }
        }

        match (lookup_env(ACCESS_KEY_ID_VAR), lookup_env(SECRET_ACCESS_KEY_VAR)) {
            (Some(access_key_id), Some(secret_access_key)) => {
                debug!("Using ambient credentials from environment.");
                (
                    Some(Credentials::new(access_key_id, secret_access_key)),
                    CredentialSource::Ambient,
                )
            }
            _ => {
                warn!("No credentials found. Requests will be sent without authentication.");
                (None, CredentialSource::Anonymous)
            }
        }
    }

    fn load_profile(&self, profile: &str) -> Result<Credentials, CredentialsError> {
        let path = self.profiles_file.as_ref().context(NoProfilesFile)?;
        let contents = std::fs::read_to_string(path).context(Io { path })?;
        let mut profiles: HashMap<String, Credentials> = serde_yaml::from_str(&contents).context(Parse { path })?;
        profiles.remove(profile).context(ProfileNotFound { profile, path })
    }
}
