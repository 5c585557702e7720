use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::policy::AllowList;

// Whether the private-network block is active
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "fhir-gateway")]
#[command(about = "Forwarding gateway for browser clients talking to third-party HTTP APIs")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GATEWAY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Production mode blocks private, loopback and link-local targets
    #[arg(long, env = "GATEWAY_MODE", value_enum, default_value_t = Mode::Development)]
    pub mode: Mode,

    // Allowed destination hosts (comma-separated, "*.example.org" for subdomains)
    // Empty means every host is allowed
    #[arg(long, env = "ALLOWED_FHIR_DOMAINS", default_value = "")]
    pub allowed_domains: String,

    // Rate limit max requests per window
    #[arg(long, env = "GATEWAY_RATE_LIMIT", default_value_t = 60)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "GATEWAY_RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Upstream timeout in seconds
    #[arg(long, env = "GATEWAY_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,

    // Largest upstream body relayed back to the caller
    #[arg(long, env = "GATEWAY_MAX_RESPONSE_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_response_bytes: u64,

    // Resolve target hostnames and block private addresses they point at
    #[arg(long, env = "GATEWAY_RESOLVE_HOSTS")]
    pub resolve_hosts: bool,

    // How often expired rate limit records are dropped, in seconds
    #[arg(long, env = "GATEWAY_SWEEP_INTERVAL", default_value_t = 300)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::parse(&self.allowed_domains)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }
}
