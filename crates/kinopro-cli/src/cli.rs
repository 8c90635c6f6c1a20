//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use kinopro_core::auth::{PASSWORD_ENV, USERNAME_ENV};

/// Extract the episode list of a kinopro.uz player page.
///
/// Logs in with the given credentials (or reuses a cached session) and
/// prints the episodes as JSON.
#[derive(Parser, Debug)]
#[command(name = "kinopro")]
#[command(author, version, about)]
pub struct Args {
    /// Player page URL, e.g. http://kinopro.uz/player/serial/lost
    pub url: String,

    /// Account username
    #[arg(short, long, env = USERNAME_ENV)]
    pub username: Option<String>,

    /// Account password
    #[arg(short, long, env = PASSWORD_ENV, hide_env_values = true)]
    pub password: Option<String>,

    /// Directory for cached session cookies
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Site root to log into
    #[arg(long)]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_url_is_required() {
        let result = Args::try_parse_from(["kinopro"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = Args::try_parse_from([
            "kinopro",
            "http://kinopro.uz/player/serial/lost",
            "-u",
            "alice",
            "-p",
            "secret",
            "--cache-dir",
            "/tmp/sessions",
            "-t",
            "10",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.url, "http://kinopro.uz/player/serial/lost");
        assert_eq!(args.username.as_deref(), Some("alice"));
        assert_eq!(args.password.as_deref(), Some("secret"));
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/sessions")));
        assert_eq!(args.timeout, 10);
        assert_eq!(args.verbose, 2);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_timeout_range() {
        let result = Args::try_parse_from(["kinopro", "http://kinopro.uz/player/serial/lost", "-t", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let result = Args::try_parse_from(["kinopro", "--help"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
