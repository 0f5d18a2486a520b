use crate::validation::Field;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "skillswap-live",
    about = "real-time notifications, swap counters and platform messages for skill swap",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Event channel endpoint URL
    #[arg(short, long, default_value = "ws://127.0.0.1:5000/ws/events")]
    pub url: String,

    /// Base URL of the skill swap web application (REST endpoints)
    #[arg(short, long, default_value = "http://127.0.0.1:5000/")]
    pub api_url: String,

    /// Receive platform messages over a second, dedicated connection
    #[arg(long)]
    pub dedicated_platform_channel: bool,

    /// Endpoint for the dedicated platform connection (implies --dedicated-platform-channel)
    #[arg(long)]
    pub platform_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,

    /// Enable metrics server
    #[arg(long)]
    pub metrics: bool,

    /// Metrics server port
    #[arg(long, default_value = "9090")]
    pub metrics_port: u16,

    /// Connection and request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Reconnection delay in seconds
    #[arg(long, default_value = "5")]
    pub reconnect_delay: u64,

    /// Maximum number of reconnection attempts (0 for unlimited)
    #[arg(long, default_value = "0")]
    pub max_reconnects: u32,

    /// Pending request count polling interval in seconds
    #[arg(long, default_value = "30")]
    pub pending_interval: u64,

    /// Active swap count polling interval in seconds
    #[arg(long, default_value = "60")]
    pub active_interval: u64,

    /// Discard counter responses older than the one already shown
    #[arg(long)]
    pub sequenced_refresh: bool,

    /// Seconds a notification stays visible
    #[arg(long, default_value = "5")]
    pub notification_ttl: u64,

    /// Maximum visible notifications, oldest evicted first (0 for unlimited)
    #[arg(long, default_value = "10")]
    pub max_notifications: usize,

    /// Maximum retained platform messages (0 for unlimited)
    #[arg(long, default_value = "50")]
    pub max_broadcasts: usize,

    /// Disable colored output (useful for piping to files)
    #[arg(long)]
    pub no_color: bool,

    /// Quiet mode - only notifications and platform messages
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stream notifications, counters and platform messages (default)
    Watch,
    /// Look up skill name suggestions
    Suggest {
        /// Partial skill name, at least two characters
        query: String,
    },
    /// Ask the platform whether an email address is still free
    CheckEmail { email: String },
    /// Check a form value against the platform's field rules
    Validate {
        #[arg(value_enum)]
        field: Field,
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_is_the_default_and_flags_parse() {
        let args = Args::try_parse_from([
            "skillswap-live",
            "--pending-interval",
            "10",
            "--max-notifications",
            "0",
        ])
        .unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.pending_interval, 10);
        assert_eq!(args.max_notifications, 0);
        assert_eq!(args.active_interval, 60);
    }

    #[test]
    fn validate_subcommand_takes_a_field() {
        let args =
            Args::try_parse_from(["skillswap-live", "validate", "skill-name", "Rust"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Validate {
                field: Field::SkillName,
                value: "Rust".into()
            })
        );
    }
}
