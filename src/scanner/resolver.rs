//! Reverse-DNS lookups through the hickory resolver.
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use hickory_resolver::{
    config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    system_conf, TokioAsyncResolver,
};
use log::debug;
use tokio::{fs, io};

use super::ReverseLookup;

/// Resolves PTR records for scanned hosts.
pub struct ReverseResolver {
    resolver: TokioAsyncResolver,
}

impl ReverseResolver {
    /// Derive a DNS resolver.
    ///
    /// 1. if the `resolver` parameter has been set:
    ///     1. assume the parameter is a path and attempt to read IPs.
    ///     2. parse the input as a comma-separated list of IPs.
    /// 2. if `resolver` is not set:
    ///    1. attempt to derive a resolver from the system config. (e.g.
    ///       `/etc/resolv.conf` on *nix).
    ///    2. finally, build a CloudFlare-based resolver (default
    ///       behaviour).
    ///
    /// In every case a single attempt bounded by `timeout` is made per query.
    pub async fn new(resolver: Option<&str>, timeout: Duration) -> Self {
        let resolver = match resolver {
            Some(r) => {
                let mut config = ResolverConfig::new();
                let resolver_ips = match read_resolver_from_file(r).await {
                    Ok(ips) => ips,
                    Err(_) => r
                        .split(',')
                        .filter_map(|r| IpAddr::from_str(r.trim()).ok())
                        .collect::<Vec<_>>(),
                };
                for ip in resolver_ips {
                    config.add_name_server(NameServerConfig::new(
                        SocketAddr::new(ip, 53),
                        Protocol::Udp,
                    ));
                }
                TokioAsyncResolver::tokio(config, bounded(ResolverOpts::default(), timeout))
            }
            None => match system_conf::read_system_conf() {
                Ok((config, opts)) => TokioAsyncResolver::tokio(config, bounded(opts, timeout)),
                Err(e) => {
                    debug!("No usable system resolver ({e}), falling back to Cloudflare");
                    TokioAsyncResolver::tokio(
                        ResolverConfig::cloudflare_tls(),
                        bounded(ResolverOpts::default(), timeout),
                    )
                }
            },
        };

        Self { resolver }
    }
}

fn bounded(mut opts: ResolverOpts, timeout: Duration) -> ResolverOpts {
    opts.timeout = timeout;
    opts.attempts = 1;
    opts
}

/// Parses an input file of IPs for use in DNS resolution.
async fn read_resolver_from_file(path: &str) -> io::Result<Vec<IpAddr>> {
    let ips = fs::read_to_string(path)
        .await?
        .lines()
        .filter_map(|line| IpAddr::from_str(line.trim()).ok())
        .collect();

    Ok(ips)
}

/// Drops the root label so names read like `gateway.lan`, not `gateway.lan.`.
fn without_root(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_owned()
}

impl ReverseLookup for ReverseResolver {
    async fn hostname(&self, address: Ipv4Addr) -> anyhow::Result<Option<String>> {
        match self.resolver.reverse_lookup(IpAddr::V4(address)).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .next()
                .map(|ptr| without_root(&ptr.to_string()))
                .filter(|name| !name.is_empty())),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Hostname source for a run: real lookups, or none at all.
pub enum HostnameLookup {
    Dns(ReverseResolver),
    Disabled,
}

impl ReverseLookup for HostnameLookup {
    async fn hostname(&self, address: Ipv4Addr) -> anyhow::Result<Option<String>> {
        match self {
            Self::Dns(resolver) => resolver.hostname(address).await,
            Self::Disabled => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn root_label_is_dropped() {
        assert_eq!(without_root("gateway.lan."), "gateway.lan");
        assert_eq!(without_root("gateway.lan"), "gateway.lan");
        assert_eq!(without_root("."), "");
    }

    #[test]
    fn timeout_is_applied() {
        let opts = bounded(ResolverOpts::default(), Duration::from_millis(750));
        assert_eq!(opts.timeout, Duration::from_millis(750));
        assert_eq!(opts.attempts, 1);
    }

    #[tokio::test]
    async fn resolver_file_skips_garbage() {
        let path = std::env::temp_dir().join(format!("hostsweep-resolvers-{}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "1.1.1.1\nnot an ip\n  9.9.9.9  \n").unwrap();

        let ips = read_resolver_from_file(path.to_str().unwrap()).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            ips,
            [
                IpAddr::from([1, 1, 1, 1]),
                IpAddr::from([9, 9, 9, 9])
            ]
        );
    }

    #[tokio::test]
    async fn missing_resolver_file_is_an_error() {
        assert!(read_resolver_from_file("/definitely/not/here").await.is_err());
    }

    #[tokio::test]
    async fn disabled_lookup_has_no_names() {
        let lookup = HostnameLookup::Disabled;
        assert_eq!(lookup.hostname(Ipv4Addr::LOCALHOST).await.unwrap(), None);
    }
}
