//! Result publishing
//!
//! [`Publisher`] implementations upload the summary and transcript under a
//! `<category>/<user>/` hierarchy:
//!
//! - [`ObjectStorePublisher`] — S3 or MinIO bucket
//! - [`LocalDirPublisher`] — directory tree on local disk (dev/test)
//!
//! Output filenames are `<sanitized title>_<request id>_<suffix>`, falling
//! back to `<request id>_<suffix>` when the metadata has no title.

pub mod local;
pub mod object_store;

use std::path::PathBuf;
use std::sync::Arc;

use video_digest_common::{Publisher, Result};

pub use local::LocalDirPublisher;
pub use object_store::{ObjectStoreConfig, ObjectStorePublisher};

/// Which publisher implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputProvider {
    ObjectStore,
    Local,
}

impl std::str::FromStr for OutputProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "object_store" => Ok(Self::ObjectStore),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown output provider: {other}")),
        }
    }
}

/// Build the configured publisher.
pub async fn publisher_from_config(
    provider: OutputProvider,
    object_store: ObjectStoreConfig,
    local_output_dir: PathBuf,
) -> Result<Arc<dyn Publisher>> {
    match provider {
        OutputProvider::ObjectStore => {
            Ok(Arc::new(ObjectStorePublisher::new(object_store).await?))
        }
        OutputProvider::Local => Ok(Arc::new(LocalDirPublisher::new(local_output_dir))),
    }
}

/// Strip a title down to filename-safe characters: spaces become
/// underscores, everything outside `[A-Za-z0-9_-]` is dropped.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Output filename for an artifact.
#[must_use]
pub fn output_filename(title: Option<&str>, request_id: &str, suffix: &str) -> String {
    match title.map(sanitize_filename).filter(|t| !t.is_empty()) {
        Some(title) => format!("{title}_{request_id}_{suffix}"),
        None => format!("{request_id}_{suffix}"),
    }
}
