/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::auth::Sessions;
use crate::store::Store;

#[derive(Deserialize)]
struct ConfigFile {
    db_connect_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    template_dir: Option<String>,
    static_dir: Option<String>,
}

#[derive(Debug)]
pub struct Cfg {
    pub db_connect_string: String,
    pub addr: SocketAddr,
    pub template_dir: String,
    pub static_dir: String,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_connect_string: "host=localhost user=enroll password='enroll' dbname=enroll".to_owned(),
            addr: SocketAddr::new(
                "0.0.0.0".parse().unwrap(),
                8001
            ),
            template_dir: "templates".to_owned(),
            static_dir: "static".to_owned(),
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        let cf: ConfigFile = toml::from_str(&file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_connect_string {
            c.db_connect_string = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.template_dir {
            c.template_dir = s;
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = s;
        }

        Ok(c)
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
#[derive(Debug)]
pub struct Glob {
    pub store: Store,
    pub sessions: Sessions,
    pub addr: SocketAddr,
    pub template_dir: String,
    pub static_dir: String,
}

/// Loads system configuration and ensures the users table exists.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let path = path.as_ref();

    let cfg = if path.exists() {
        Cfg::from_file(path)?
    } else {
        log::info!(
            "No config file at {}; using default configuration.",
            path.display()
        );
        Cfg::default()
    };
    log::info!("Configuration read:\n{:#?}", &cfg);

    log::trace!("Checking state of user DB...");
    let store = Store::new(cfg.db_connect_string.clone());
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of user DB: {}", &e);
        return Err(estr);
    }
    log::trace!("...user DB okay.");

    let glob = Glob {
        store,
        sessions: Sessions::new(),
        addr: cfg.addr,
        template_dir: cfg.template_dir,
        static_dir: cfg.static_dir,
    };

    Ok(glob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::ensure_logging;

    #[test]
    fn config_file_overrides_defaults() {
        ensure_logging();

        let cfg = Cfg::from_file("test/config_0.toml").unwrap();
        assert_eq!(
            &cfg.db_connect_string,
            "host=localhost user=enroll_test password='enroll_test' dbname=enroll_store_test"
        );
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(&cfg.template_dir, "templates");

        let default = Cfg::default();
        assert_eq!(cfg.addr.ip(), default.addr.ip());
    }

    #[test]
    fn unreadable_config_is_an_error() {
        ensure_logging();
        assert!(Cfg::from_file("test/no_such_file.toml").is_err());
    }
}
