use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::viewport::{
    DEFAULT_AT_BOTTOM_THRESHOLD, DEFAULT_ESTIMATED_ITEM_HEIGHT, DEFAULT_FULL_RENDER_THRESHOLD,
    DEFAULT_OVERSCAN, WindowConfig,
};

pub const SETTINGS_DIRECTORY_NAME: &str = "transcript";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "TRANSCRIPT_";
pub const DEFAULT_SEARCH_MIN_QUERY_LEN: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewSettings {
    #[serde(default = "default_full_render_threshold")]
    pub full_render_threshold: usize,
    #[serde(default = "default_overscan")]
    pub overscan: usize,
    #[serde(default = "default_at_bottom_threshold_px")]
    pub at_bottom_threshold_px: f32,
    #[serde(default = "default_estimated_item_height_px")]
    pub estimated_item_height_px: f32,
    #[serde(default = "default_search_min_query_len")]
    pub search_min_query_len: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            full_render_threshold: default_full_render_threshold(),
            overscan: default_overscan(),
            at_bottom_threshold_px: default_at_bottom_threshold_px(),
            estimated_item_height_px: default_estimated_item_height_px(),
            search_min_query_len: default_search_min_query_len(),
        }
    }
}

impl ViewSettings {
    pub fn normalized(mut self) -> Self {
        self.full_render_threshold = self.full_render_threshold.max(1);
        self.at_bottom_threshold_px =
            non_negative_or(self.at_bottom_threshold_px, DEFAULT_AT_BOTTOM_THRESHOLD);
        self.estimated_item_height_px =
            non_negative_or(self.estimated_item_height_px, DEFAULT_ESTIMATED_ITEM_HEIGHT);
        if self.estimated_item_height_px < 1.0 {
            self.estimated_item_height_px = DEFAULT_ESTIMATED_ITEM_HEIGHT;
        }
        self.search_min_query_len = self.search_min_query_len.max(1);
        self
    }

    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            full_render_threshold: self.full_render_threshold,
            overscan: self.overscan,
            at_bottom_threshold: self.at_bottom_threshold_px,
            estimated_item_height: self.estimated_item_height_px,
        }
    }
}

fn non_negative_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        fallback
    }
}

/// Settings shared by every view in the process.
///
/// Reads go through an `ArcSwap`; a `reload` swaps the snapshot without
/// touching views that already hold the previous one.
pub struct SettingsStore {
    settings: Arc<ArcSwap<ViewSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".transcript"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Lenient open: an unreadable file logs a warning and yields defaults.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = match read_settings(&config_path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(%error, "using default view settings");
                ViewSettings::default()
            }
        };
        Self::with_settings(config_path, settings)
    }

    /// Strict open for explicitly requested files.
    pub fn open(config_path: PathBuf) -> SettingsResult<Self> {
        let settings = read_settings(&config_path)?;
        Ok(Self::with_settings(config_path, settings))
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ViewSettings> {
        self.settings.load_full()
    }

    /// Re-reads the file and environment.
    ///
    /// On failure the current snapshot stays in place and the error is
    /// returned.
    pub fn reload(&self) -> SettingsResult<Arc<ViewSettings>> {
        let settings = Arc::new(read_settings(&self.config_path)?);
        self.settings.store(Arc::clone(&settings));
        Ok(settings)
    }

    fn with_settings(config_path: PathBuf, settings: ViewSettings) -> Self {
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }
}

/// Defaults, then the JSON file when present, then `TRANSCRIPT_*` variables.
fn read_settings(path: &Path) -> SettingsResult<ViewSettings> {
    let mut figment = Figment::from(Serialized::defaults(ViewSettings::default()));
    if path.exists() {
        figment = figment.merge(Json::file(path));
    } else {
        tracing::info!(path = %path.display(), "settings file not found, using defaults");
    }

    let settings = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .extract::<ViewSettings>()
        .context(ExtractSettingsSnafu {
            stage: "extract-view-settings",
            path: path.to_path_buf(),
        })?
        .normalized();

    tracing::info!(
        path = %path.display(),
        full_render_threshold = settings.full_render_threshold,
        overscan = settings.overscan,
        "loaded view settings"
    );
    Ok(settings)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("invalid view settings in {path:?} on `{stage}`: {source}"))]
    ExtractSettings {
        stage: &'static str,
        path: PathBuf,
        #[snafu(source(from(figment::Error, Box::new)))]
        source: Box<figment::Error>,
    },
}

pub type SettingsResult<T> = Result<T, SettingsError>;

fn default_full_render_threshold() -> usize {
    DEFAULT_FULL_RENDER_THRESHOLD
}

fn default_overscan() -> usize {
    DEFAULT_OVERSCAN
}

fn default_at_bottom_threshold_px() -> f32 {
    DEFAULT_AT_BOTTOM_THRESHOLD
}

fn default_estimated_item_height_px() -> f32 {
    DEFAULT_ESTIMATED_ITEM_HEIGHT
}

fn default_search_min_query_len() -> usize {
    DEFAULT_SEARCH_MIN_QUERY_LEN
}
