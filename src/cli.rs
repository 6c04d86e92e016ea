use anyhow::bail;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
pub struct CLI {
    /// Reported to the server for connection bookkeeping.
    #[clap(long, default_value = "ileq-migrate")]
    pub app_name: String,

    #[clap(long, default_value = "localhost")]
    pub host: String,

    #[clap(long, default_value_t = 27017)]
    pub port: u32,

    #[clap(long)]
    pub username: Option<String>,

    #[clap(long)]
    pub password: Option<String>,

    /// Database holding the ileQueries collection.
    #[clap(long)]
    pub database: String,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Applies change sets that have not run against this database yet.
    Run,
    /// Prints the recorded change set runs.
    Status,
}

impl CLI {
    /// Username and password only make sense together.
    pub fn credentials(&self) -> anyhow::Result<Option<(&str, &str)>> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => Ok(Some((username, password))),
            (None, None) => Ok(None),
            _ => bail!("--username and --password must be provided together"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CLI;
    use clap::Parser;

    #[test]
    fn test_credentials_default_to_none() -> anyhow::Result<()> {
        let cli = CLI::parse_from(["migrate", "--database", "exports", "run"]);

        assert_eq!(None, cli.credentials()?);
        Ok(())
    }

    #[test]
    fn test_credentials_come_paired() -> anyhow::Result<()> {
        let cli = CLI::parse_from([
            "migrate",
            "--database",
            "exports",
            "--username",
            "mongo",
            "--password",
            "secret",
            "status",
        ]);

        assert_eq!(Some(("mongo", "secret")), cli.credentials()?);
        Ok(())
    }

    #[test]
    fn test_credentials_reject_lone_username() {
        let cli =
            CLI::parse_from(["migrate", "--database", "exports", "--username", "mongo", "run"]);

        assert!(cli.credentials().is_err());
    }
}
