//! Application records tracked by the inventory.

/// Unique string naming an application installation (e.g. `org.gnome.Nautilus`).
pub type PackageId = String;

/// What: Capture one installed application as known to the launcher.
///
/// Inputs:
/// - Produced by a [`crate::source::PackageSource`] during population or by an install event adapter.
///
/// Output:
/// - Stored verbatim in the inventory, keyed by `package_id`.
///
/// Details:
/// - Values are never merged: a reinstall yields a new `App` that replaces the stored one.
/// - `launch` and `icon` are opaque references (an `Exec` line, an icon name or path);
///   this crate does not resolve or load them.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct App {
    /// Globally unique package identifier.
    pub package_id: PackageId,
    /// Human-readable display label.
    pub label: String,
    /// Launch intent reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub launch: String,
    /// Icon reference.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
}

impl App {
    /// What: Build an `App` with only an identifier and label.
    ///
    /// Inputs:
    /// - `package_id`: Package identifier.
    /// - `label`: Display label.
    ///
    /// Output:
    /// - `App` with empty launch and icon references.
    #[must_use]
    pub fn new(package_id: impl Into<PackageId>, label: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            label: label.into(),
            launch: String::new(),
            icon: String::new(),
        }
    }

    /// Set the launch intent reference.
    #[must_use]
    pub fn with_launch(mut self, launch: impl Into<String>) -> Self {
        self.launch = launch.into();
        self
    }

    /// Set the icon reference.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }
}
