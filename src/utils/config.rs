#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, warn, error, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::Deserialize;
use std::{fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;

// Poems Utilities
use crate::utils::{poems_utils, errors::Errors};

use super::poems_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const DEFAULT_ROOT_DIR     : &str = "~/.poems";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const POEMS_DIR            : &str = "/poems";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";  // relative to config dir
const POEMS_CONFIG_FILE    : &str = "/poems.toml";  // relative to config dir

// Used when no log4rs configuration file exists.
const DEFAULT_LOG_PATTERN  : &str = "{d(%Y-%m-%dT%H:%M:%S%.3fZ)(utc)} {h({l})} {t} - {m}{n}";

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref POEMS_ARGS: PoemsArgs = init_poems_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref POEMS_DIRS: PoemsDirs = init_poems_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// PoemsDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct PoemsDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub poems_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// PoemsArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "poems_args", about = "Command line arguments for the Poems Server.")]
pub struct PoemsArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the configuration, the logs and the
    /// poems directory.  It defaults to ~/.poems.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    #[structopt(short, long)]
    pub create_dirs_only: bool,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
#[allow(dead_code)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub poems_args: &'static PoemsArgs,
    pub poems_dirs: &'static PoemsDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Poems Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_poems_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_poems_args() -> PoemsArgs {
    let args = PoemsArgs::from_args();
    println!("{:?}", args);
    args
}

// ---------------------------------------------------------------------------
// init_poems_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_poems_dirs() -> PoemsDirs {
    // Initialize the mistrust object.
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory if it exists.
    // If it doesn't exist, create it.
    let root_dir = get_root_dir();
    check_poems_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_poems_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_poems_dir(&logs_dir, "logs directory", &mistrust);

    let poems_dir = root_dir.clone() + POEMS_DIR;
    check_poems_dir(&poems_dir, "poems directory", &mistrust);

    // Package up and return the directories.
    PoemsDirs {root_dir, config_dir, logs_dir, poems_dir}
}

// ---------------------------------------------------------------------------
// check_poems_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that it is a directory.
 * If it doesn't exist, create it.  The mistrust package creates directories
 * with 0o700 permissions.  Existing directories that are open to group or
 * other get a warning, since logging isn't up yet it goes to stderr.
 *
 * Any failure results in a panic.
 */
fn check_poems_dir(dir: &String, msgname: &str, mistrust: &Mistrust ) {
    // Get the path object.
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The poems server {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        // Make sure the path represents a directory.
        if !path.is_dir() {
            panic!("The poems server {} path must be a directory: {}", msgname, dir);
        }

        // Report directories readable by others.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o077 != 0 {
            eprintln!("WARNING: The poems server {} path has {:o} permissions, 0o700 is recommended: {}",
                      msgname, perm & 0o777, dir);
        }
    } else {
        // Create the directory with the correct permissions.
        if let Err(e) = mistrust.make_directory(path) {
            panic!("Make directory error for {:?}: {}", path, &e.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Command line --root-dir argument
    //  2. Default location
    //
    let root_dir = match POEMS_ARGS.root_dir.clone() {
        Some(r) => r,
        None => DEFAULT_ROOT_DIR.to_string(),
    };

    // Canonicalize the path.
    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the configuration file in the config directory.  If
 * there's no such file, log to the console at info level.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).exists() {
        if let Err(e) = log4rs::init_file(logconfig.clone(), Default::default()) {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        }
        info!("Log4rs initialized using: {}", logconfig);
    } else {
        if let Err(e) = init_default_log() {
            panic!("{}", Errors::Log4rsInitialization(e.to_string()));
        }
        info!("Log4rs initialized with console defaults, no file found at: {}", logconfig);
    }
}

// ---------------------------------------------------------------------------
// init_default_log:
// ---------------------------------------------------------------------------
fn init_default_log() -> Result<()> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(DEFAULT_LOG_PATTERN)))
        .build();
    let config = LogConfig::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    POEMS_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file doesn't exist the default values are used.
 */
fn get_parms() -> Result<Parms> {
    // Get the config file path from its data directory.
    let config_file = POEMS_DIRS.config_dir.clone() + POEMS_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = poems_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = parse_config(&contents, &config_file_abs)?;
    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
fn parse_config(contents: &str, config_file: &str) -> Result<Config> {
    match toml::from_str(contents) {
        Ok(c)  => Ok(c),
        Err(e) => {
            let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file.to_string()), e);
            error!("{}", msg);
            Result::Err(anyhow!(msg))
        }
    }
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // If this fails the application aborts.
    let parms = get_parms().expect("FAILED to read configuration file.");
    if parms.config.http_port == 0 {
        warn!("Configured http_port is 0, the OS will choose a port.");
    }
    RuntimeCtx {parms, poems_args: &POEMS_ARGS, poems_dirs: &POEMS_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::new();
        assert_eq!(config.http_port, 3000);
        assert_eq!(config.http_addr, "http://localhost");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = parse_config("http_port = 8080\n", "poems.toml").unwrap();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.title, "Poems Server");
    }

    #[test]
    fn bad_toml_rejected() {
        let err = parse_config("http_port = \"not a port\"", "poems.toml").unwrap_err();
        assert!(err.to_string().contains("Unable to parse TOML file: poems.toml"));
    }
}
