//! This is the `ConfigFile` struct.
//!
//! This is for finding the right default locations for the configuration files of the
//! `ambutrack` tools.  It is configuration-struct neutral, only storing the base directory, and
//! `load()` reads the proper file or the default one.
//!
//! The loaded configuration is available through `.inner()` or `.inner_mut()`.
//!

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use eyre::{eyre, Result};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, trace};

/// Main name for the directory base
pub const TAG: &str = "ambutrack";

/// Every configuration file carries a version number so that we can refuse old ones.
///
pub trait Versioned {
    /// Version the code expects
    const VERSION: usize;

    /// Version read from the file
    fn version(&self) -> usize;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Bad file version {found}, expected {expected}")]
    BadFileVersion { found: usize, expected: usize },
    #[error("Missing configuration file {0}")]
    MissingConfig(String),
    #[error("No home directory")]
    NoHome,
}

/// Generic configuration file holder.
///
#[derive(Debug)]
pub struct ConfigFile<T: Debug + DeserializeOwned + Versioned> {
    /// This is the base directory for all files.
    basedir: PathBuf,
    /// Which file did we read
    path: PathBuf,
    inner: T,
}

/// Return the default configuration directory for `tag`.
///
/// On Unix, it is `$HOME/.config/<tag>`, on Windows `%LOCALAPPDATA%\<tag>`.
///
#[tracing::instrument]
pub fn config_path(tag: &str) -> Result<PathBuf> {
    let base = BaseDirs::new().ok_or(ConfigError::NoHome)?;

    #[cfg(unix)]
    let base = base.home_dir().join(".config");

    #[cfg(windows)]
    let base = base.data_local_dir().to_path_buf();

    let base = base.join(tag);
    debug!("base = {base:?}");
    Ok(base)
}

impl<T> ConfigFile<T>
where
    T: Debug + DeserializeOwned + Versioned,
{
    /// Load the file and return a struct T in the right format.
    ///
    /// Use the following search path:
    /// - file specified on CLI
    /// - `filename` in the default basedir (base on $HOME or $LOCALAPPDATA)
    ///
    #[tracing::instrument]
    pub fn load(filename: &str, fname: Option<&Path>) -> Result<ConfigFile<T>> {
        let basedir = config_path(TAG)?;

        let fname = match fname {
            Some(fname) => fname.to_path_buf(),
            None => basedir.join(filename),
        };

        if !fname.exists() {
            return Err(ConfigError::MissingConfig(fname.to_string_lossy().to_string()).into());
        }
        let fname = fname.canonicalize()?;
        trace!("Loading config file {fname:?}");

        let data = fs::read_to_string(&fname)?;
        let inner = Self::parse(&data)?;

        Ok(ConfigFile {
            basedir,
            path: fname,
            inner,
        })
    }

    /// Parse HCL text and check its version.
    ///
    #[tracing::instrument(skip(data))]
    pub fn parse(data: &str) -> Result<T> {
        let inner: T = hcl::from_str(data).map_err(|e| eyre!("invalid configuration: {e}"))?;
        debug!("struct data = {inner:?}");

        if inner.version() != T::VERSION {
            return Err(ConfigError::BadFileVersion {
                found: inner.version(),
                expected: T::VERSION,
            }
            .into());
        }
        Ok(inner)
    }

    /// Returns the path of the default config directory
    ///
    pub fn config_path(&self) -> PathBuf {
        self.basedir.clone()
    }

    /// Returns the path of the file we actually loaded
    ///
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Return the inner configuration file
    ///
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Return the inner configuration file as putable
    ///
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume and return the configuration itself.
    ///
    pub fn into_inner(self) -> T {
        self.inner
    }
}
