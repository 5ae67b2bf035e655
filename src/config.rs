//! Configuration types for PDF-to-PNG conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. The config is handed by value to
//! [`crate::convert::Converter`], and its `output_dir` roots the
//! [`crate::store::SessionStore`]. Nothing is read from process-wide globals,
//! so two instances (for example in tests) can point at isolated roots.
//!
//! [`ServerConfig`] carries the listener address for the HTTP service.

use crate::error::Pdf2PngError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default rasterisation resolution.
pub const DEFAULT_DPI: u32 = 150;

/// Lowest accepted DPI. Below this, body text is unreadable.
pub const MIN_DPI: u32 = 72;

/// Highest accepted DPI. An A4 page at 400 DPI is already ~15 Mpx.
pub const MAX_DPI: u32 = 400;

/// Default storage root for session directories.
pub const DEFAULT_OUTPUT_DIR: &str = "/data/output";

/// Default upload cap: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Default per-conversion wall-clock budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for a PDF-to-PNG conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2png::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .output_dir("/tmp/pdf2png")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Rendering DPI. Range: 72–400. Default: 150.
    ///
    /// Pixel size of a page is `round(points * dpi / 72)` on each axis.
    pub dpi: u32,

    /// Root directory under which one directory per session is created.
    /// Default: `/data/output`.
    pub output_dir: PathBuf,

    /// Largest accepted upload body in bytes. Default: 100 MiB.
    pub max_upload_bytes: usize,

    /// Wall-clock budget for one conversion in seconds. Default: 300.
    ///
    /// When exceeded, rendering stops at the next page boundary and the
    /// request fails with [`Pdf2PngError::Timeout`].
    pub timeout_secs: u64,

    /// Explicit path to the pdfium shared library.
    /// If None, the system library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Optional observer for per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("dpi", &self.dpi)
            .field("output_dir", &self.output_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("timeout_secs", &self.timeout_secs)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2PngError> {
        let c = &self.config;
        if c.dpi < MIN_DPI || c.dpi > MAX_DPI {
            return Err(Pdf2PngError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {}",
                c.dpi
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Pdf2PngError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(Pdf2PngError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.timeout_secs == 0 {
            return Err(Pdf2PngError::InvalidConfig(
                "Timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Listener settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
