//! Settings store: validated partial updates over the persisted singleton.

use std::rc::Rc;

use tracing::{debug, error, warn};

use crate::models::{Settings, SettingsPatch};
use crate::persistence::{Backend, PersistenceError};

pub struct SettingsStore {
    settings: Settings,
    backend: Rc<dyn Backend>,
}

impl SettingsStore {
    /// Loads settings from `backend`. Nothing stored yet means defaults.
    ///
    /// Stored values outside their ranges are clamped in memory; storage is
    /// left as it is until the next update.
    pub fn load(backend: Rc<dyn Backend>) -> Result<Self, PersistenceError> {
        let stored = backend.get_settings()?;
        let settings = stored.clone().clamped();
        if settings != stored {
            warn!(?stored, "stored settings out of range, clamped");
        }
        Ok(Self { settings, backend })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// Clamps and merges `patch`, then persists the applied fields.
    ///
    /// The in-memory settings keep the update even if the write fails.
    pub fn update(&mut self, patch: SettingsPatch) -> Result<(), PersistenceError> {
        let patch = patch.clamped();
        if patch.is_empty() {
            return Ok(());
        }

        self.settings.apply(&patch);
        debug!(?patch, "settings updated");
        self.backend.update_settings(&patch).inspect_err(|e| {
            error!(error = %e, "failed to save settings");
        })
    }

    /// Restores the built-in defaults.
    pub fn reset(&mut self) -> Result<(), PersistenceError> {
        self.settings = Settings::default();
        debug!("settings reset to defaults");
        self.backend
            .update_settings(&SettingsPatch::full(&self.settings))
            .inspect_err(|e| {
                error!(error = %e, "failed to reset settings");
            })
    }
}
