use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

// Global verbose flag for controlling debug output
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set the global verbose flag. When true, debug messages will be printed.
pub fn set_verbose(verbose: bool) {
    VERBOSE.store(verbose, Ordering::SeqCst);
}

/// Check if verbose mode is enabled.
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Print a message to stderr only if verbose mode is enabled.
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if $crate::config::is_verbose() {
            eprintln!($($arg)*);
        }
    };
}

/// Canonical list of candidate config file names we search for on disk.
const CONFIG_FILENAMES: &[&str] = &["pipeline.yml", "pipeline.yaml"];

/// Public handle that stores the loaded configuration, its source path, and warnings.
pub struct PipelineConfigHandle {
    pub config: PipelineConfig,
    pub source: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Complete configuration file structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub defaults: PipelineDefaults,
}

/// Default pipeline parameter values.
///
/// These are the tunables that are not exposed as per-run command line
/// options; the convergence policy (coverage target, attempt cap) is
/// fixed and deliberately not configurable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineDefaults {
    /// Initial edge sensitivity for contour discovery
    pub edge_threshold: u8,

    /// Edge sensitivity forced on retry attempts after the first.
    /// 1 maximizes recall at the cost of admitting spurious contours.
    pub retry_edge_threshold: u8,

    /// Fraction of working-copy pixels replaced with extreme values
    /// before median filtering (0.0-0.5)
    pub salt_pepper_fraction: f32,

    /// Clip limit for adaptive luminance equalization (per-bin,
    /// normalized against a uniform histogram)
    pub clahe_clip_limit: f32,

    /// Tile grid side length for adaptive luminance equalization
    pub clahe_tile_grid: u32,
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            edge_threshold: 12,
            retry_edge_threshold: 1,
            salt_pepper_fraction: 0.05,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
        }
    }
}

impl PipelineDefaults {
    fn sanitize(&mut self) {
        self.salt_pepper_fraction = self.salt_pepper_fraction.clamp(0.0, 0.5);
        self.clahe_clip_limit = self.clahe_clip_limit.clamp(1.0, 40.0);
        self.clahe_tile_grid = self.clahe_tile_grid.clamp(1, 64);
        if self.retry_edge_threshold == 0 {
            self.retry_edge_threshold = 1;
        }
    }
}

impl PipelineConfig {
    fn sanitize(mut self) -> Self {
        self.defaults.sanitize();
        self
    }
}

static CONFIG: OnceLock<PipelineConfigHandle> = OnceLock::new();

/// Load (once) and return the process-wide pipeline configuration.
///
/// Looks for a config file in the current working directory; falls back
/// to built-in defaults when none exists or the file fails to parse.
pub fn pipeline_config_handle() -> &'static PipelineConfigHandle {
    CONFIG.get_or_init(|| {
        let mut warnings = Vec::new();

        for name in CONFIG_FILENAMES {
            let candidate = PathBuf::from(name);
            if !candidate.is_file() {
                continue;
            }

            match fs::read_to_string(&candidate) {
                Ok(text) => match serde_yaml::from_str::<PipelineConfig>(&text) {
                    Ok(config) => {
                        return PipelineConfigHandle {
                            config: config.sanitize(),
                            source: Some(candidate),
                            warnings,
                        };
                    }
                    Err(e) => {
                        warnings.push(format!("Failed to parse {}: {}", candidate.display(), e));
                    }
                },
                Err(e) => {
                    warnings.push(format!("Failed to read {}: {}", candidate.display(), e));
                }
            }
        }

        PipelineConfigHandle {
            config: PipelineConfig::default(),
            source: None,
            warnings,
        }
    })
}

/// Report where the active configuration came from (verbose mode only).
/// Parse warnings are always printed so a broken config file is not
/// silently ignored.
pub fn log_config_usage() {
    let handle = pipeline_config_handle();

    for warning in &handle.warnings {
        eprintln!("[CONFIG] {}", warning);
    }

    match &handle.source {
        Some(path) => verbose_println!("[CONFIG] Using pipeline defaults from {}", path.display()),
        None => verbose_println!("[CONFIG] Using built-in pipeline defaults"),
    }
}
