/// file: src/config.rs
/// description: runtime configuration built from CLI arguments
use crate::{
    cli::Args, counters::RefreshPolicy, error::SkillSwapError, events::EventName,
    types::CounterKind,
};
use anyhow::Result;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub channel: ChannelConfig,
    pub api: ApiConfig,
    pub counters: CounterConfig,
    pub notifications: NotificationConfig,
    pub broadcasts: BroadcastConfig,
    pub metrics: MetricsConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub url: Url,
    pub timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnects: u32,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub websocket: WebSocketConfig,
    /// When set, platform messages get their own connection to this URL.
    pub platform_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub pending_interval: Duration,
    pub active_interval: Duration,
    pub policy: RefreshPolicy,
    pub pending_triggers: Vec<EventName>,
    pub active_triggers: Vec<EventName>,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub ttl: Duration,
    /// 0 means unbounded.
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// 0 means unbounded.
    pub capacity: usize,
}

#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DisplayConfig {
    pub colored: bool,
    pub quiet: bool,
}

impl ChannelConfig {
    pub fn platform_websocket(&self) -> Option<WebSocketConfig> {
        self.platform_url.as_ref().map(|url| WebSocketConfig {
            url: url.clone(),
            ..self.websocket.clone()
        })
    }
}

impl CounterConfig {
    pub fn interval(&self, kind: CounterKind) -> Duration {
        match kind {
            CounterKind::Pending => self.pending_interval,
            CounterKind::Active => self.active_interval,
        }
    }

    pub fn triggers(&self, kind: CounterKind) -> &[EventName] {
        match kind {
            CounterKind::Pending => &self.pending_triggers,
            CounterKind::Active => &self.active_triggers,
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            pending_interval: Duration::from_secs(30),
            active_interval: Duration::from_secs(60),
            policy: RefreshPolicy::LastResponseWins,
            pending_triggers: vec![
                EventName::NewRequest,
                EventName::RequestAccepted,
                EventName::RequestRejected,
            ],
            // active swaps are polled only unless an embedder opts in
            active_triggers: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let timeout = Duration::from_secs(30);
        Config {
            channel: ChannelConfig {
                websocket: WebSocketConfig {
                    url: Url::parse("ws://127.0.0.1:5000/ws/events").expect("static url"),
                    timeout,
                    reconnect_delay: Duration::from_secs(5),
                    max_reconnects: 0,
                },
                platform_url: None,
            },
            api: ApiConfig {
                base_url: Url::parse("http://127.0.0.1:5000/").expect("static url"),
                timeout,
            },
            counters: CounterConfig::default(),
            notifications: NotificationConfig {
                ttl: Duration::from_secs(5),
                capacity: 10,
            },
            broadcasts: BroadcastConfig { capacity: 50 },
            metrics: MetricsConfig {
                enabled: false,
                port: 9090,
            },
            display: DisplayConfig {
                colored: true,
                quiet: false,
            },
        }
    }
}

// Url::join drops the last path segment unless the base ends with '/'.
fn as_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn non_zero_secs(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        return Err(SkillSwapError::InvalidConfig(format!("{} must be at least 1 second", name)).into());
    }
    Ok(Duration::from_secs(secs))
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self> {
        let url = Url::parse(&args.url)?;
        let platform_url = match &args.platform_url {
            Some(raw) => Some(Url::parse(raw)?),
            None if args.dedicated_platform_channel => Some(url.clone()),
            None => None,
        };
        let timeout = non_zero_secs("timeout", args.timeout)?;

        Ok(Config {
            channel: ChannelConfig {
                websocket: WebSocketConfig {
                    url,
                    timeout,
                    reconnect_delay: Duration::from_secs(args.reconnect_delay),
                    max_reconnects: args.max_reconnects,
                },
                platform_url,
            },
            api: ApiConfig {
                base_url: as_base(Url::parse(&args.api_url)?),
                timeout,
            },
            counters: CounterConfig {
                pending_interval: non_zero_secs("pending interval", args.pending_interval)?,
                active_interval: non_zero_secs("active interval", args.active_interval)?,
                policy: if args.sequenced_refresh {
                    RefreshPolicy::Sequenced
                } else {
                    RefreshPolicy::LastResponseWins
                },
                ..CounterConfig::default()
            },
            notifications: NotificationConfig {
                ttl: non_zero_secs("notification ttl", args.notification_ttl)?,
                capacity: args.max_notifications,
            },
            broadcasts: BroadcastConfig {
                capacity: args.max_broadcasts,
            },
            metrics: MetricsConfig {
                enabled: args.metrics,
                port: args.metrics_port,
            },
            display: DisplayConfig {
                colored: !args.no_color,
                quiet: args.quiet,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(extra: &[&str]) -> Result<Config> {
        let mut argv = vec!["skillswap-live"];
        argv.extend_from_slice(extra);
        Config::from_args(&Args::parse_from(argv))
    }

    #[test]
    fn defaults_match_platform_constants() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.counters.interval(CounterKind::Pending), Duration::from_secs(30));
        assert_eq!(config.counters.interval(CounterKind::Active), Duration::from_secs(60));
        assert_eq!(config.notifications.ttl, Duration::from_secs(5));
        assert!(config.channel.platform_websocket().is_none());
        assert_eq!(config.counters.policy, RefreshPolicy::LastResponseWins);
    }

    #[test]
    fn dedicated_platform_channel_reuses_the_event_url() {
        let config = parse(&["--dedicated-platform-channel", "--reconnect-delay", "2"]).unwrap();
        let platform = config.channel.platform_websocket().expect("dedicated channel");
        assert_eq!(platform.url, config.channel.websocket.url);
        assert_eq!(platform.reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn api_base_gets_a_trailing_slash() {
        let config = parse(&["--api-url", "https://swap.example.com/app"]).unwrap();
        let joined = config
            .api
            .base_url
            .join(CounterKind::Pending.endpoint())
            .unwrap();
        assert_eq!(
            joined.as_str(),
            "https://swap.example.com/app/api/swaps/pending-count"
        );
    }

    #[test]
    fn zero_intervals_are_rejected() {
        assert!(parse(&["--pending-interval", "0"]).is_err());
        assert!(parse(&["--notification-ttl", "0"]).is_err());
    }
}
