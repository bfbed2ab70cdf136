use crate::config::{Config, ConfigValue};
use clap::Parser;

/// netsentry — host and network telemetry agent.
///
/// Samples OS counters on a schedule, passively reconstructs per-flow
/// traffic statistics from a local interface, and evaluates threshold
/// alert rules against the resulting time series.
#[derive(Parser, Debug, Clone)]
#[command(
    name    = "netsentry",
    version = "0.2.0",
    about   = "Host and network telemetry agent",
    long_about = None,
)]
pub struct Cli {
    // ── Configuration ────────────────────────────────────────────────────────

    /// Load configuration from this file.
    ///
    /// The file is a flat `key: value` list; any key it sets overrides the
    /// built-in default. Flags given on the command line override the file
    /// in turn.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<String>,

    // ── Capture ──────────────────────────────────────────────────────────────

    /// Network interface for packet capture.
    ///
    /// Passing this flag also enables the capture subsystem, as if
    /// `enable_packet_capture: true` had been set in the config file.
    #[arg(short = 'i', long = "interface", value_name = "IFACE")]
    pub interface: Option<String>,

    // ── Query surface ────────────────────────────────────────────────────────

    /// Enable the read-only REST API surface.
    #[arg(long = "api-enable")]
    pub api_enable: bool,

    /// Port for the REST API surface.
    #[arg(long = "api-port", value_name = "PORT")]
    pub api_port: Option<u16>,

    // ── Logging ──────────────────────────────────────────────────────────────

    /// Emit log entries as newline-delimited JSON (NDJSON).
    ///
    /// Each event is a self-contained JSON object on its own line, suitable
    /// for ingestion by log shippers (Logstash, Fluentd, Vector) or SIEM
    /// platforms (Splunk, Elastic, Loki).
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Minimum log level (debug, info, warning, error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Write log output to this file in addition to stdout.
    #[arg(short = 'o', long = "log-file", value_name = "PATH")]
    pub log_file: Option<String>,
}

impl Cli {
    /// Writes command-line overrides into the configuration map.
    ///
    /// Called after the config file (if any) has been applied, so flags win
    /// over file values which win over defaults.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref iface) = self.interface {
            config.set("capture_interface", ConfigValue::Str(iface.clone()));
            config.set("enable_packet_capture", ConfigValue::Bool(true));
        }
        if self.api_enable {
            config.set("enable_api", ConfigValue::Bool(true));
        }
        if let Some(port) = self.api_port {
            config.set("api_port", ConfigValue::Int(i64::from(port)));
        }
        if let Some(ref level) = self.log_level {
            config.set("log_level", ConfigValue::Str(level.clone()));
        }
        if let Some(ref path) = self.log_file {
            config.set("log_file", ConfigValue::Str(path.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_flag_enables_capture() {
        let cli = Cli::parse_from(["netsentry", "--interface", "wlan0"]);
        let mut cfg = Config::default();
        cli.apply_overrides(&mut cfg);

        assert!(cfg.get_bool("enable_packet_capture", false));
        assert_eq!(cfg.get_str("capture_interface", ""), "wlan0");
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from(["netsentry", "--api-enable", "--api-port", "9999"]);
        let mut cfg = Config::default();
        cli.apply_overrides(&mut cfg);

        assert!(cfg.get_bool("enable_api", false));
        assert_eq!(cfg.get_u16("api_port", 0), 9999);
    }
}
