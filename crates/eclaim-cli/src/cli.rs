use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "eclaim")]
#[command(about = "eclaim CLI: submit medical-record claims and inspect their audit trail")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// eclaim server base URL (overrides config and ECLAIM_URL env var)
    #[arg(short, long, global = true, env = "ECLAIM_URL")]
    pub server: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "ECLAIM_PROFILE", default_value = "default")]
    pub profile: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Table,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a medical record to the clearinghouse through the server
    Submit(SubmitArgs),
    /// Show the audit trail of an episode
    Audit(AuditArgs),
    /// List recorded episodes, most recent first
    List(ListArgs),
    /// Normalize a bundle locally without sending it
    Normalize(NormalizeArgs),
    /// Normalize, frame and encrypt a bundle locally, printing the dataMR
    Seal(SealArgs),
    /// Decrypt a dataMR payload locally
    Decrypt(DecryptArgs),
    /// Print a signed header set for the clearinghouse
    Sign(SignArgs),
    /// Show the server's facility and clearinghouse settings
    Settings,
    /// Check server health
    Status,
    /// Manage CLI configuration
    Config(ConfigArgs),
}

/// Clearinghouse credentials for the local commands.
#[derive(clap::Args, Clone)]
pub struct CredentialArgs {
    /// Consumer ID (X-cons-id)
    #[arg(long, env = "ECLAIM_CONS_ID")]
    pub cons_id: String,
    /// Consumer secret
    #[arg(long, env = "ECLAIM_CONS_SECRET", hide_env_values = true)]
    pub secret: String,
    /// Facility (PPK) code
    #[arg(long, env = "ECLAIM_FACILITY_CODE")]
    pub facility_code: String,
    /// Gateway user key
    #[arg(long, env = "ECLAIM_USER_KEY", hide_env_values = true, default_value = "")]
    pub user_key: String,
}

#[derive(clap::Args)]
pub struct SubmitArgs {
    /// Path to the JSON request or bare Bundle (reads from stdin if omitted)
    #[arg(long)]
    pub file: Option<String>,
    /// Episode (SEP) number, when the file holds a bare Bundle
    #[arg(long)]
    pub episode: Option<String>,
    /// Service type code or label
    #[arg(long)]
    pub service_type: Option<String>,
    /// Billing month
    #[arg(long)]
    pub month: Option<String>,
    /// Billing year
    #[arg(long)]
    pub year: Option<String>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum AuditPart {
    /// The whole audit record
    #[default]
    Record,
    /// The bundle as it was received
    Bundle,
    /// The most recent delivery attempt
    Response,
}

#[derive(clap::Args)]
pub struct AuditArgs {
    /// Episode (SEP) number
    pub episode: String,
    /// Part of the record to show
    #[arg(long, default_value = "record")]
    pub part: AuditPart,
}

#[derive(clap::Args)]
pub struct ListArgs {
    /// Maximum number of records
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(clap::Args)]
pub struct NormalizeArgs {
    /// Path to the Bundle JSON (reads from stdin if omitted)
    #[arg(long)]
    pub file: Option<String>,
}

#[derive(clap::Args)]
pub struct SealArgs {
    /// Path to the Bundle JSON (reads from stdin if omitted)
    #[arg(long)]
    pub file: Option<String>,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(clap::Args)]
pub struct DecryptArgs {
    /// The dataMR ciphertext
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// File holding the ciphertext (reads from stdin if neither is given)
    #[arg(long)]
    pub file: Option<String>,
    /// Undo the extra base64 layer of the JSON fallback encoding first
    #[arg(long)]
    pub rewrapped: bool,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(clap::Args)]
pub struct SignArgs {
    /// Unix timestamp to sign (defaults to now)
    #[arg(long)]
    pub timestamp: Option<u64>,
    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (server, format)
    pub key: String,
    /// Value
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn audit_part_defaults_to_record() {
        let cli = Cli::try_parse_from(["eclaim", "audit", "0301R0010124V000001"]).unwrap();
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert!(matches!(args.part, AuditPart::Record));

        let cli = Cli::try_parse_from([
            "eclaim",
            "audit",
            "0301R0010124V000001",
            "--part",
            "response",
        ])
        .unwrap();
        let Commands::Audit(args) = cli.command else {
            panic!("expected audit");
        };
        assert!(matches!(args.part, AuditPart::Response));
    }

    #[test]
    fn decrypt_takes_data_or_file_not_both() {
        let err = Cli::try_parse_from([
            "eclaim",
            "decrypt",
            "--data",
            "abc",
            "--file",
            "x.txt",
            "--cons-id",
            "1",
            "--secret",
            "s",
            "--facility-code",
            "f",
        ]);
        assert!(err.is_err());
    }
}
