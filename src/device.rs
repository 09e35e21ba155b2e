//! Device-facing seams: location services switch and runtime permissions
//!
//! The screen only needs yes/no answers from the device, so these traits are
//! small. `ConsoleDevice` answers them from configuration and, when the
//! policy says so, by asking on the terminal.

use async_trait::async_trait;
use std::collections::HashSet;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::AppError;
use crate::config::DeviceConfig;

/// Location permissions the screen needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Precise (GPS) location
    FineLocation,
    /// Approximate (network) location
    CoarseLocation,
}

/// Both location permissions, requested together
pub const LOCATION_PERMISSIONS: [Permission; 2] =
    [Permission::FineLocation, Permission::CoarseLocation];

/// The current status of a permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionStatus {
    /// Permission has been granted by the user.
    Granted,
    /// Permission has been denied by the user.
    Denied,
    /// Permission has not been requested yet.
    NotDetermined,
}

/// Device location services switch
#[async_trait]
pub trait LocationServices: Send {
    /// Whether at least one location provider is switched on
    fn is_enabled(&self) -> bool;

    /// Send the user to the location settings. Returns `false` when the
    /// user declines to go there.
    async fn prompt_enable(&mut self) -> Result<bool, AppError>;
}

/// Runtime permission checks and requests
#[async_trait]
pub trait PermissionGate: Send {
    fn check(&self, permission: Permission) -> PermissionStatus;

    /// Request every permission in `permissions`; one status per entry
    async fn request(
        &mut self,
        permissions: &[Permission],
    ) -> Result<Vec<PermissionStatus>, AppError>;
}

/// Everything the screen asks of the device
pub trait Device: LocationServices + PermissionGate {}

impl<T: LocationServices + PermissionGate> Device for T {}

/// How the console device answers permission requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionPolicy {
    Granted,
    Denied,
    Prompt,
}

impl FromStr for PermissionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Ok(PermissionPolicy::Granted),
            "denied" => Ok(PermissionPolicy::Denied),
            "prompt" => Ok(PermissionPolicy::Prompt),
            other => Err(AppError::config(format!(
                "Invalid permission policy '{other}'"
            ))),
        }
    }
}

type Input = Box<dyn AsyncBufRead + Unpin + Send>;

/// Terminal-backed device
pub struct ConsoleDevice {
    policy: PermissionPolicy,
    services_enabled: bool,
    providers_available: bool,
    granted: HashSet<Permission>,
    input: Input,
}

impl ConsoleDevice {
    /// Device reading answers from stdin
    pub fn from_config(config: &DeviceConfig, providers_available: bool) -> Result<Self, AppError> {
        Ok(Self::with_input(
            config.permissions.parse()?,
            config.location_services,
            providers_available,
            Box::new(BufReader::new(tokio::io::stdin())),
        ))
    }

    /// Device reading answers from `input`
    #[must_use]
    pub fn with_input(
        policy: PermissionPolicy,
        services_enabled: bool,
        providers_available: bool,
        input: Input,
    ) -> Self {
        Self {
            policy,
            services_enabled,
            providers_available,
            granted: HashSet::new(),
            input,
        }
    }

    async fn ask(&mut self, question: &str) -> Result<bool, AppError> {
        eprint!("{question} [y/N] ");
        let mut line = String::new();
        let read = self.input.read_line(&mut line).await?;
        let answer = read > 0 && matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        debug!(question, answer, "Console prompt answered");
        Ok(answer)
    }
}

#[async_trait]
impl LocationServices for ConsoleDevice {
    fn is_enabled(&self) -> bool {
        self.services_enabled && self.providers_available
    }

    async fn prompt_enable(&mut self) -> Result<bool, AppError> {
        let accepted = self
            .ask("Location services are off. Open location settings and turn them on?")
            .await?;
        if accepted {
            info!("User enabled location services from settings");
            self.services_enabled = true;
        }
        Ok(accepted)
    }
}

#[async_trait]
impl PermissionGate for ConsoleDevice {
    fn check(&self, permission: Permission) -> PermissionStatus {
        match self.policy {
            PermissionPolicy::Granted => PermissionStatus::Granted,
            PermissionPolicy::Denied => PermissionStatus::Denied,
            PermissionPolicy::Prompt if self.granted.contains(&permission) => {
                PermissionStatus::Granted
            }
            PermissionPolicy::Prompt => PermissionStatus::NotDetermined,
        }
    }

    async fn request(
        &mut self,
        permissions: &[Permission],
    ) -> Result<Vec<PermissionStatus>, AppError> {
        let status = match self.policy {
            PermissionPolicy::Granted => PermissionStatus::Granted,
            PermissionPolicy::Denied => PermissionStatus::Denied,
            PermissionPolicy::Prompt => {
                if self.ask("Allow airquality to access this device's location?").await? {
                    self.granted.extend(permissions.iter().copied());
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                }
            }
        };
        Ok(vec![status; permissions.len()])
    }
}
