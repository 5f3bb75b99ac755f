//! Host platform detection and platform-conditional manifest values.

pub mod arch;
pub mod os;
pub mod paths;
pub mod select;

use arch::Arch;
use os::Os;
use std::fmt;

use thiserror::Error;

pub use paths::InstallLayout;
pub use select::{Conditional, MergeAll, PlatformTable, platform_key, resolve_opt};

/// Errors raised while resolving platform-specific values.
#[derive(Debug, Error)]
pub enum PlatformError {
  /// The running OS or CPU is not one hoist knows about.
  #[error("unsupported host platform: {os}/{arch}")]
  UnsupportedHost { os: String, arch: String },

  /// A conditional value has neither an entry for this platform nor a `default`.
  #[error("Unsupported platform type: {0}")]
  UnsupportedPlatform(String),

  /// A `platform_key` names an attribute that has no accessor.
  #[error("unknown platform attribute '{0}' in platform_key")]
  UnknownAttribute(String),
}

/// Capability interface over the properties of the machine being installed to.
///
/// Manifests select values by attribute name (see [`PlatformAttr`]); every
/// attribute maps onto exactly one accessor here.
pub trait PlatformInfo: Send + Sync {
  /// Operating system identifier, e.g. `linux`, `darwin`, `windows`.
  fn operating_system_name(&self) -> String;

  /// Kernel type name, e.g. `Linux`, `Darwin`, `Windows_NT`.
  fn operating_system_type(&self) -> String;

  /// CPU architecture, e.g. `x86_64`, `aarch64`.
  fn architecture(&self) -> String;
}

/// Attribute names accepted in a manifest `platform_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformAttr {
  Platform,
  Type,
  Arch,
}

impl PlatformAttr {
  /// Map a configuration-declared attribute name to its accessor.
  pub fn from_name(name: &str) -> Result<Self, PlatformError> {
    match name {
      "platform" | "os" => Ok(Self::Platform),
      "type" => Ok(Self::Type),
      "arch" => Ok(Self::Arch),
      other => Err(PlatformError::UnknownAttribute(other.to_string())),
    }
  }

  /// Read this attribute from a platform.
  pub fn read(self, info: &dyn PlatformInfo) -> String {
    match self {
      Self::Platform => info.operating_system_name(),
      Self::Type => info.operating_system_type(),
      Self::Arch => info.architecture(),
    }
  }
}

/// Platform identifier combining architecture and OS (e.g., "aarch64-darwin")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  /// Create a new platform identifier
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Like [`Platform::current`], but reports which part was unsupported.
  pub fn detect() -> Result<Self, PlatformError> {
    Self::current().ok_or_else(|| PlatformError::UnsupportedHost {
      os: std::env::consts::OS.to_string(),
      arch: std::env::consts::ARCH.to_string(),
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }
}

impl PlatformInfo for Platform {
  fn operating_system_name(&self) -> String {
    self.os.as_str().to_string()
  }

  fn operating_system_type(&self) -> String {
    self.os.type_name().to_string()
  }

  fn architecture(&self) -> String {
    self.arch.as_str().to_string()
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
