//! Provides a means to read, parse and hold configuration options for scans.
use clap::{Parser, ValueEnum};
use colored::Colorize;
use serde_derive::Deserialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use crate::address::{self, Address, FormatError};
use crate::range::{self, Enumeration};

/// Narrowest prefix accepted from users. Anything wider would enumerate
/// more than sixteen million addresses per block.
pub const MIN_PREFIX: u8 = 8;
pub const MAX_PREFIX: u8 = 32;

/// Upper bound of in-flight probes when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Represents the way liveness is checked.
///   - Icmp runs the platform `ping` with a single echo request.
///   - Tcp attempts TCP connections; a handshake or a refusal counts as alive.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    Icmp,
    Tcp,
}

/// The complete, validated input of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    start: Address,
    hosts: u64,
    prefix: u8,
}

impl ScanRequest {
    pub fn new(start: Address, hosts: u64, prefix: u8) -> Result<Self, FormatError> {
        if hosts < 1 {
            return Err(FormatError::HostCountTooSmall);
        }
        check_prefix(i64::from(prefix), &prefix.to_string())?;

        Ok(Self {
            start,
            hosts,
            prefix,
        })
    }

    /// Validates all three parameters from their textual form.
    ///
    /// ```rust
    /// # use hostsweep::input::ScanRequest;
    /// let request = ScanRequest::parse("10.0.0.0", "5", "24").unwrap();
    /// assert_eq!(request.enumerate().entries().len(), 6);
    ///
    /// assert!(ScanRequest::parse("10.0.0.0", "5", "7").is_err());
    /// ```
    pub fn parse(start: &str, hosts: &str, prefix: &str) -> Result<Self, FormatError> {
        Self::new(
            address::encode(start)?,
            parse_host_count(hosts)?,
            parse_prefix(prefix)?,
        )
    }

    pub const fn start(&self) -> Address {
        self.start
    }

    pub const fn hosts(&self) -> u64 {
        self.hosts
    }

    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Enumerates the range this request describes.
    pub fn enumerate(self) -> Enumeration {
        range::enumerate(self.start, self.hosts, self.prefix)
    }
}

/// Parses a desired host count, which must be an integer of at least one.
pub fn parse_host_count(input: &str) -> Result<u64, FormatError> {
    let input = input.trim();
    let value: i64 = input
        .parse()
        .map_err(|_| FormatError::InvalidHostCount(input.to_owned()))?;

    u64::try_from(value)
        .ok()
        .filter(|&hosts| hosts >= 1)
        .ok_or(FormatError::HostCountTooSmall)
}

/// Parses a CIDR prefix length in `MIN_PREFIX..=MAX_PREFIX`. A leading `/`
/// is tolerated so that `/24` and `24` mean the same thing.
pub fn parse_prefix(input: &str) -> Result<u8, FormatError> {
    let input = input.trim();
    let digits = input.strip_prefix('/').unwrap_or(input);
    let value: i64 = digits
        .parse()
        .map_err(|_| FormatError::InvalidPrefix(input.to_owned()))?;

    check_prefix(value, input)
}

fn check_prefix(value: i64, input: &str) -> Result<u8, FormatError> {
    u8::try_from(value)
        .ok()
        .filter(|prefix| (MIN_PREFIX..=MAX_PREFIX).contains(prefix))
        .ok_or_else(|| FormatError::PrefixOutOfRange {
            value: input.to_owned(),
            min: MIN_PREFIX,
            max: MAX_PREFIX,
        })
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "hostsweep",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Sweeps an IPv4 range for live hosts and their reverse-DNS names.
/// Missing range parameters are asked for interactively.
pub struct Opts {
    /// The starting IPv4 address, for example 10.200.40.1.
    #[arg(short, long, value_parser = address::encode)]
    pub address: Option<Address>,

    /// How many host addresses to scan. Network and broadcast addresses
    /// met along the way are listed but not counted.
    #[arg(short = 'n', long, value_parser = parse_host_count)]
    pub hosts: Option<u64>,

    /// The CIDR prefix length used to classify addresses (8 to 32).
    #[arg(short, long, value_parser = parse_prefix)]
    pub cidr: Option<u8>,

    /// Whether to ignore the configuration file or not.
    #[arg(long)]
    pub no_config: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Greppable mode. One line per address, no table or progress bar.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Print the finished report as JSON.
    #[arg(long, conflicts_with = "greppable")]
    pub json: bool,

    /// A comma-delimited list or file of DNS resolvers.
    #[arg(long)]
    pub resolver: Option<String>,

    /// Skip reverse-DNS lookups entirely.
    #[arg(long)]
    pub no_resolve: bool,

    /// Maximum number of hosts probed at the same time.
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// The timeout in milliseconds before a host is assumed to be down.
    #[arg(short, long, default_value = "1000")]
    pub timeout: u32,

    /// The timeout in milliseconds for a single reverse-DNS lookup.
    #[arg(long, default_value = "2000")]
    pub resolve_timeout: u32,

    /// How liveness is checked.
    #[arg(short, long, value_enum, ignore_case = true, default_value = "icmp")]
    pub method: ProbeMethod,

    /// Ports tried by the tcp method. Example: 80,443,22.
    #[arg(long, value_delimiter = ',', default_value = "80,443,22")]
    pub tcp_ports: Vec<u16>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    pub fn read() -> Self {
        Self::parse()
    }

    /// Greppable and JSON output go to stdout untouched, so banners,
    /// notices and prompts must stay off it.
    pub const fn machine_readable(&self) -> bool {
        self.greppable || self.json
    }

    /// Merges values found within the user configuration file into the
    /// command line options.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            greppable,
            accessible,
            concurrency,
            timeout,
            resolve_timeout,
            method,
            tcp_ports,
            no_resolve
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        // A prefix given on the command line wins over the configured one.
        if self.cidr.is_none() {
            self.cidr = config.cidr;
        }

        merge_optional!(resolver, ulimit);
    }

    /// Builds the scan request from the options, asking `prompter` for any
    /// parameter that was not given on the command line.
    pub fn request<R: BufRead, W: Write>(
        &self,
        prompter: &mut Prompter<R, W>,
    ) -> io::Result<ScanRequest> {
        let start = match self.address {
            Some(start) => start,
            None => prompter.ask(
                "Enter the starting IP address (e.g., 10.200.40.1):",
                "➤ ",
                address::encode,
            )?,
        };
        let hosts = match self.hosts {
            Some(hosts) => hosts,
            None => prompter.ask("Enter the number of hosts to scan:", "➤ ", parse_host_count)?,
        };
        let prefix = match self.cidr {
            Some(prefix) => prefix,
            None => prompter.ask(
                "Enter the CIDR netmask (e.g., 8, 16, 22, 23, 24, 25, 26, 27, 28):",
                "➤ /",
                parse_prefix,
            )?,
        };

        ScanRequest::new(start, hosts, prefix)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            address: None,
            hosts: None,
            cidr: None,
            no_config: true,
            no_banner: false,
            config_path: None,
            greppable: true,
            accessible: false,
            json: false,
            resolver: None,
            no_resolve: false,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: 1_000,
            resolve_timeout: 2_000,
            method: ProbeMethod::Icmp,
            tcp_ports: vec![80, 443, 22],
            ulimit: None,
        }
    }
}

/// Asks questions on a line-based reader until a valid answer arrives.
///
/// Invalid answers print the validation error and repeat the question; only
/// I/O failures (including end of input) end the loop.
pub struct Prompter<R, W> {
    input: R,
    output: W,
    accessible: bool,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub const fn new(input: R, output: W, accessible: bool) -> Self {
        Self {
            input,
            output,
            accessible,
        }
    }

    pub fn ask<T>(
        &mut self,
        question: &str,
        marker: &str,
        parse: impl Fn(&str) -> Result<T, FormatError>,
    ) -> io::Result<T> {
        loop {
            if self.accessible {
                writeln!(self.output, "{question}")?;
                write!(self.output, "{}", marker.trim_start_matches('➤').trim_start())?;
            } else {
                writeln!(self.output, "{}", question.bright_yellow())?;
                write!(self.output, "{}", marker.bright_green())?;
            }
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input closed before a valid answer was given",
                ));
            }

            match parse(line.trim()) {
                Ok(value) => return Ok(value),
                Err(e) if self.accessible => writeln!(self.output, "{e}\n")?,
                Err(e) => writeln!(self.output, "{}\n", format!("❌ {e}").bright_red())?,
            }
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    cidr: Option<u8>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    concurrency: Option<usize>,
    timeout: Option<u32>,
    resolve_timeout: Option<u32>,
    method: Option<ProbeMethod>,
    tcp_ports: Option<Vec<u16>>,
    no_resolve: Option<bool>,
    resolver: Option<String>,
    ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing or unreadable file yields an empty config.
    ///
    /// # Format
    ///
    /// cidr = 24
    /// concurrency = 40
    /// timeout = 500
    /// method = "tcp"
    /// tcp_ports = [22, 80, 443]
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> Result<Self, toml::de::Error> {
        let content = custom_config_path
            .or_else(default_config_path)
            .filter(|path| path.exists())
            .and_then(|path| fs::read_to_string(path).ok())
            .unwrap_or_default();

        toml::from_str(&content)
    }
}

/// Constructs default path to config toml
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".hostsweep.toml");
    Some(config_path)
}
