//! Process configuration from `.env` and the environment.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `PORTICO_ADDR` | `0.0.0.0:3000` | Listen address for [`Server`](crate::Server) |
//! | `TEMPLATE_DIR` | unset | Directory a [`TemplateRenderer`](crate::TemplateRenderer) reads from |

use std::net::SocketAddr;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Error;

pub const ADDR_VAR: &str = "PORTICO_ADDR";
pub const TEMPLATE_DIR_VAR: &str = "TEMPLATE_DIR";

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub addr: SocketAddr,
    pub template_dir: Option<PathBuf>,
}

impl Config {
    /// Loads `.env` from the working directory (if there is one), then reads
    /// the process environment.
    pub fn load() -> Result<Self, Error> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => debug!("no .env file"),
            Err(e) => return Err(Error::Config(format!(".env: {e}"))),
        }
        Self::from_vars(std::env::vars())
    }

    /// Builds a config from explicit `(name, value)` pairs. Unknown names
    /// are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut addr = None;
        let mut template_dir = None;

        for (name, value) in vars {
            let value: String = value.into();
            match name.as_ref() {
                ADDR_VAR => addr = Some(value),
                TEMPLATE_DIR_VAR => template_dir = Some(PathBuf::from(value)),
                _ => {}
            }
        }

        let addr = addr.as_deref().unwrap_or(DEFAULT_ADDR);
        let addr = addr
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("{ADDR_VAR}=`{addr}`: {e}")))?;

        Ok(Self { addr, template_dir })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            template_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_known_variables() {
        let config = Config::from_vars([
            ("PORTICO_ADDR", "127.0.0.1:8080"),
            ("TEMPLATE_DIR", "views"),
            ("HOME", "/root"),
        ])
        .unwrap();

        assert_eq!(config.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.template_dir, Some(PathBuf::from("views")));
    }

    #[test]
    fn rejects_bad_address() {
        let err = Config::from_vars([("PORTICO_ADDR", "localhost")]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("PORTICO_ADDR")));
    }
}
