use crate::config::Settings;
use crate::error::Result;
use crate::repository::ReleaseSource;
use crate::upstream::GnomeMirror;
use std::sync::Arc;
use std::time::Duration;

pub struct RepositoryFactory;

impl RepositoryFactory {
    pub fn create_mirror(settings: &Settings) -> Result<Arc<dyn ReleaseSource>> {
        let client = GnomeMirror::new(
            &settings.upstream.mirror,
            Duration::from_secs(settings.upstream.timeout_secs),
        )?;
        Ok(Arc::new(client))
    }
}
