//! Command-line and environment configuration.
//!
//! Every connection setting can come from the environment (or a `.env`
//! file) so credentials need not appear on the command line.

use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::ad_client::DirectoryConfig;
use crate::errors::{LastLogonError, Result};
use crate::ldap_utils::domain_to_base_dn;
use crate::output::OutputFormat;
use crate::resolver::ResolverConfig;
use crate::secure_types::Credentials;

/// Find the most recent logon of Active Directory accounts by querying every domain controller
#[derive(Parser)]
#[command(name = "dc-lastlogon", version, long_about = None)]
pub struct Cli {
    /// Accounts to resolve (sAMAccountName, UPN or DN). Reads one per line from stdin when omitted or "-"
    pub identifiers: Vec<String>,

    /// Primary domain controller used for lookups and DC enumeration
    #[arg(short, long, env = "LASTLOGON_SERVER")]
    pub server: String,

    /// DNS domain name, used to derive the base DN
    #[arg(short, long, env = "LASTLOGON_DOMAIN")]
    pub domain: Option<String>,

    /// Search base; defaults to the domain (or the server's parent domain)
    #[arg(short, long, env = "LASTLOGON_BASE_DN")]
    pub base_dn: Option<String>,

    /// Bind user (DOMAIN\user or UPN); anonymous bind when empty
    #[arg(short, long, env = "LASTLOGON_USERNAME", default_value = "")]
    pub username: String,

    /// Bind password
    #[arg(short, long, env = "LASTLOGON_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,

    /// Use LDAPS for every connection
    #[arg(long, env = "LASTLOGON_LDAPS")]
    pub ldaps: bool,

    /// Verify TLS certificates
    #[arg(long)]
    pub verify_tls: bool,

    /// Seconds allowed for connecting and binding to a server
    #[arg(long, default_value_t = 15)]
    pub connect_timeout_secs: u64,

    /// Seconds allowed for each per-server query
    #[arg(long, default_value_t = 30)]
    pub query_timeout_secs: u64,

    /// Domain controllers queried at once for one account
    #[arg(long, default_value_t = 8)]
    pub max_concurrent_servers: usize,

    /// Accounts processed at once
    #[arg(long, default_value_t = 4)]
    pub max_concurrent_accounts: usize,

    /// Directory operations in flight at once
    #[arg(long, default_value_t = 16)]
    pub max_in_flight: usize,

    /// Query one server and one account at a time
    #[arg(long)]
    pub sequential: bool,

    /// Also report description and creation time
    #[arg(short, long)]
    pub extended: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Default tracing filter when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        }
    }

    /// Identifiers are streamed from stdin when none (or only "-") were given.
    pub fn reads_stdin(&self) -> bool {
        self.identifiers.is_empty() || self.identifiers.iter().all(|id| id == "-")
    }

    /// "-" selects stdin and cannot be mixed with explicit identifiers.
    pub fn check_identifiers(&self) -> Result<()> {
        let dashes = self.identifiers.iter().filter(|id| *id == "-").count();
        if dashes > 0 && dashes < self.identifiers.len() {
            return Err(LastLogonError::ConfigError(
                "\"-\" reads identifiers from stdin and cannot be combined with explicit accounts"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn base_dn(&self) -> Result<String> {
        if let Some(base_dn) = self.base_dn.as_deref().filter(|b| !b.trim().is_empty()) {
            return Ok(base_dn.trim().to_string());
        }
        let domain = match self.domain.as_deref() {
            Some(domain) => domain.to_string(),
            None => domain_from_host(&self.server).ok_or_else(|| {
                LastLogonError::ConfigError(
                    "cannot determine the base DN; pass --base-dn or --domain".to_string(),
                )
            })?,
        };
        Ok(domain_to_base_dn(&domain))
    }

    pub fn directory_config(&self) -> Result<DirectoryConfig> {
        if self.server.trim().is_empty() {
            return Err(LastLogonError::ConfigError("server must not be empty".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(LastLogonError::ConfigError(
                "connect timeout must be greater than zero".to_string(),
            ));
        }

        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        let mut config = DirectoryConfig::new(self.server.trim().to_string(), self.base_dn()?, credentials);
        config.use_ldaps |= self.ldaps;
        config.verify_tls = self.verify_tls;
        config.connect_timeout = Duration::from_secs(self.connect_timeout_secs);
        config.search_timeout = Duration::from_secs(self.query_timeout_secs);
        Ok(config)
    }

    pub fn resolver_config(&self) -> Result<ResolverConfig> {
        let base = if self.sequential {
            ResolverConfig::sequential()
        } else {
            ResolverConfig {
                max_concurrent_servers: self.max_concurrent_servers,
                max_concurrent_accounts: self.max_concurrent_accounts,
                max_in_flight_queries: self.max_in_flight,
                ..ResolverConfig::default()
            }
        };
        // The per-query deadline covers connect, bind and search on one DC.
        let config = ResolverConfig {
            include_extended_attributes: self.extended,
            query_timeout: Duration::from_secs(self.query_timeout_secs + self.connect_timeout_secs),
            ..base
        };
        config.validate()?;
        Ok(config)
    }
}

/// Parent domain of a host name: `dc1.corp.local` -> `corp.local`.
fn domain_from_host(server: &str) -> Option<String> {
    let host = server
        .trim_start_matches("ldaps://")
        .trim_start_matches("ldap://")
        .split(':')
        .next()?;
    if host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }
    let (_, domain) = host.split_once('.')?;
    (!domain.is_empty()).then(|| domain.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["dc-lastlogon"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_base_dn_resolution_order() {
        let cli = parse(&["--server", "dc1.corp.local", "--base-dn", "OU=Staff,DC=corp,DC=local", "alice"]);
        assert_eq!(cli.base_dn().unwrap(), "OU=Staff,DC=corp,DC=local");

        let cli = parse(&["--server", "dc1.corp.local", "--domain", "emea.corp.local", "alice"]);
        assert_eq!(cli.base_dn().unwrap(), "DC=emea,DC=corp,DC=local");

        let cli = parse(&["--server", "ldaps://dc1.corp.local:636", "alice"]);
        assert_eq!(cli.base_dn().unwrap(), "DC=corp,DC=local");
    }

    #[test]
    fn test_base_dn_requires_domain_for_ip_server() {
        let cli = parse(&["--server", "10.0.0.5", "alice"]);
        assert!(matches!(cli.base_dn(), Err(LastLogonError::ConfigError(_))));
    }

    #[test]
    fn test_reads_stdin() {
        assert!(parse(&["--server", "dc1.corp.local"]).reads_stdin());
        assert!(parse(&["--server", "dc1.corp.local", "-"]).reads_stdin());
        assert!(!parse(&["--server", "dc1.corp.local", "alice", "bob"]).reads_stdin());
    }

    #[test]
    fn test_dash_cannot_mix_with_identifiers() {
        let cli = parse(&["--server", "dc1.corp.local", "alice", "-"]);
        assert!(!cli.reads_stdin());
        assert!(matches!(cli.check_identifiers(), Err(LastLogonError::ConfigError(m)) if m.contains("stdin")));

        assert!(parse(&["--server", "dc1.corp.local", "-"]).check_identifiers().is_ok());
        assert!(parse(&["--server", "dc1.corp.local", "alice", "bob"]).check_identifiers().is_ok());
        assert!(parse(&["--server", "dc1.corp.local"]).check_identifiers().is_ok());
    }

    #[test]
    fn test_resolver_config_from_flags() {
        let cli = parse(&["--server", "dc1.corp.local", "--extended", "--sequential", "alice"]);
        let config = cli.resolver_config().unwrap();
        assert!(config.include_extended_attributes);
        assert_eq!(config.max_concurrent_accounts, 1);
        assert_eq!(config.max_concurrent_servers, 1);
        assert_eq!(config.query_timeout, Duration::from_secs(45));

        let cli = parse(&["--server", "dc1.corp.local", "--max-concurrent-servers", "0", "alice"]);
        assert!(cli.resolver_config().is_err());
    }

    #[test]
    fn test_directory_config_from_flags() {
        let cli = parse(&[
            "--server", "dc1.corp.local", "--ldaps", "-u", "CORP\\audit", "-p", "pw", "alice",
        ]);
        let config = cli.directory_config().unwrap();
        assert!(config.use_ldaps);
        assert_eq!(config.base_dn, "DC=corp,DC=local");
        assert_eq!(config.credentials.username(), "CORP\\audit");
        assert!(!format!("{:?}", config).contains("pw\""));
    }

    #[test]
    fn test_log_level() {
        assert_eq!(parse(&["--server", "dc1", "-q", "a"]).log_level(), "warn");
        assert_eq!(parse(&["--server", "dc1", "a"]).log_level(), "info");
        assert_eq!(parse(&["--server", "dc1", "-vv", "a"]).log_level(), "trace");
    }
}
