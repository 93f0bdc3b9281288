//! Process configuration: flags with environment-variable fallback.

use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

/// Command-line arguments. Every flag also reads from the environment, so a
/// bare `SRC_DIR=... DST_DIR=... hlswatch-server` deployment works without
/// any flags at all.
#[derive(Parser, Debug)]
#[command(
    name = "hlswatch-server",
    about = "Watches a media drop directory and serves HLS renditions of settled files"
)]
pub struct Args {
    /// Directory watched for incoming media files.
    #[arg(long, env = "SRC_DIR", value_name = "DIR")]
    pub source_dir: PathBuf,

    /// Directory receiving HLS renditions; served over HTTP.
    #[arg(long, env = "DST_DIR", value_name = "DIR")]
    pub dest_dir: PathBuf,

    /// Port of the static file server.
    #[arg(long, env = "PORT", default_value_t = 1880)]
    pub port: u16,
}

/// Configuration problems that abort startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("source directory {} does not exist or is not a directory", .0.display())]
    MissingSourceDir(PathBuf),

    #[error("cannot resolve working directory: {0}")]
    Cwd(#[source] std::io::Error),

    #[error("cannot create destination directory {}: {source}", .path.display())]
    CreateDestDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validated, absolutized runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Watched drop directory, absolute.
    pub source_dir: PathBuf,
    /// Rendition tree root, absolute.
    pub dest_dir: PathBuf,
    /// Static file server port.
    pub port: u16,
}

impl Config {
    /// Validate arguments into a runnable configuration.
    ///
    /// Both directories are made absolute against the working directory so
    /// every job the pipeline produces carries an absolute path. The source
    /// must already exist; the destination is created on demand.
    pub fn resolve(args: Args) -> Result<Self, ConfigError> {
        let cwd = env::current_dir().map_err(ConfigError::Cwd)?;
        let source_dir = absolutize(&cwd, args.source_dir);
        let dest_dir = absolutize(&cwd, args.dest_dir);

        if !source_dir.is_dir() {
            return Err(ConfigError::MissingSourceDir(source_dir));
        }
        std::fs::create_dir_all(&dest_dir).map_err(|source| ConfigError::CreateDestDir {
            path: dest_dir.clone(),
            source,
        })?;

        Ok(Self {
            source_dir,
            dest_dir,
            port: args.port,
        })
    }

    /// Bind address of the static file server.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn absolutize(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
