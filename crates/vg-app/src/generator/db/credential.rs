use tracing::warn;

use crate::generator::db::{CREDENTIAL_KEY, JobDatabase};

impl JobDatabase {
    /// Stored API key, if any. Kept as a bare string, not JSON.
    pub async fn get_api_key(&self) -> Option<String> {
        match self.backend.read(CREDENTIAL_KEY).await {
            Ok(key) => key.filter(|k| !k.is_empty()),
            Err(e) => {
                warn!(error = %e, "Could not read stored API key");
                None
            }
        }
    }

    /// Store the API key; an empty value removes it.
    pub async fn set_api_key(&self, key: &str) {
        let key = key.trim();
        let result = if key.is_empty() {
            self.backend.delete(CREDENTIAL_KEY).await
        } else {
            self.backend.write(CREDENTIAL_KEY, key).await
        };
        if let Err(e) = result {
            warn!(error = %e, "Could not persist API key");
        }
    }
}
