//! Package-enumeration seam: where the list of installed applications comes from.

use async_trait::async_trait;

use crate::error::EnumerationError;
use crate::model::App;

mod desktop;

pub use desktop::{DesktopEntrySource, parse_desktop_entry, read_desktop_file};

/// What: External facility that lists installed applications.
///
/// Details:
/// - May be slow; callers bound it with a timeout.
/// - A failure is terminal for that call only.
#[async_trait]
pub trait PackageSource: Send + Sync {
    /// Enumerate every installed application.
    async fn list_installed_apps(&self) -> Result<Vec<App>, EnumerationError>;
}
