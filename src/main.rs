//! Command line entry point: reads options and the config file, asks for
//! any missing range parameters, then scans and prints the report.
use hostsweep::input::{Config, Opts, Prompter};
use hostsweep::range::Enumeration;
use hostsweep::scanner::liveness::LivenessProbe;
use hostsweep::scanner::resolver::{HostnameLookup, ReverseResolver};
use hostsweep::scanner::{Scanner, ScanReport};
use hostsweep::{address::decode, output, tui, warning};

use anyhow::Context;
use colored::Colorize;
use log::debug;
use std::io;
use std::time::Duration;

#[cfg(unix)]
/// Descriptors one in-flight host can hold at once: the ping child's
/// pipes or TCP sockets, plus a resolver socket.
const FDS_PER_PROBE: u64 = 4;
#[cfg(unix)]
/// Descriptors left alone for the runtime, resolver and terminal.
const RESERVED_FDS: u64 = 64;

#[cfg(not(tarpaulin_include))]
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    let config = Config::read(opts.config_path.clone())
        .context("Found an error in the configuration file. Aborting scan.")?;
    opts.merge(&config);

    debug!("Main() `opts` arguments are {opts:?}");

    let quiet = opts.machine_readable();
    if !quiet && !opts.accessible && !opts.no_banner {
        println!("{}\n", tui::banner());
    }

    let request = {
        let stdin = io::stdin();
        let prompts: Box<dyn io::Write> = if opts.machine_readable() {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        };
        let mut prompter = Prompter::new(stdin.lock(), prompts, opts.accessible);
        opts.request(&mut prompter)
            .context("Could not read the range to scan")?
    };
    let range = request.enumerate();
    announce(&range, &opts);

    #[cfg(unix)]
    let concurrency = infer_concurrency(&opts, adjust_ulimit_size(&opts));

    #[cfg(not(unix))]
    let concurrency = opts.concurrency;

    // Failing here means the probe workers have nowhere to run.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Could not start the probe workers")?;

    let report = runtime.block_on(scan(&opts, &range, concurrency))?;
    print_report(&report, &opts);

    Ok(())
}

fn announce(range: &Enumeration, opts: &Opts) {
    let quiet = opts.machine_readable();
    if let (Some(first), Some(last)) = (range.first(), range.last()) {
        output!(
            format!(
                "Scanning {} to {} ({} hosts)",
                decode(first.address()),
                decode(last.address()),
                range.hosts()
            ),
            quiet,
            opts.accessible
        );
    }

    if range.is_truncated() {
        warning!(
            format!(
                "The address space ends at 255.255.255.255, only {} hosts could be listed.",
                range.hosts()
            ),
            quiet,
            opts.accessible
        );
    }
}

async fn scan(opts: &Opts, range: &Enumeration, concurrency: usize) -> anyhow::Result<ScanReport> {
    let liveness = LivenessProbe::pick(opts.method, &opts.tcp_ports);
    let resolve_timeout = Duration::from_millis(opts.resolve_timeout.into());
    let lookup = if opts.no_resolve {
        HostnameLookup::Disabled
    } else {
        HostnameLookup::Dns(ReverseResolver::new(opts.resolver.as_deref(), resolve_timeout).await)
    };

    let scanner = Scanner::new(
        liveness,
        lookup,
        concurrency,
        Duration::from_millis(opts.timeout.into()),
        resolve_timeout,
    )?;

    let hide_progress = opts.machine_readable() || opts.accessible;
    let bar = tui::progress_bar(range.entries().len(), hide_progress);
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available; never cancel.
            std::future::pending::<()>().await;
        }
    };

    let result = scanner
        .run_until(
            range.entries(),
            |progress| bar.set_position(progress.completed as u64),
            shutdown,
        )
        .await;
    bar.finish_and_clear();

    Ok(result?)
}

fn print_report(report: &ScanReport, opts: &Opts) {
    if opts.json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                warning!(format!("Could not serialize the report: {e}"));
            }
        }
        return;
    }

    if opts.greppable {
        println!("{}", tui::greppable(report));
        return;
    }

    println!();
    println!("{}", tui::table(report, opts.accessible));
    println!();
    println!("{}", tui::summary(&report.summary(), opts.accessible));
    println!();
    if opts.accessible {
        println!("Scan complete!");
    } else {
        println!("{}", "✅ Scan complete!".bright_green().bold());
    }
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use hostsweep::detail;
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE.get().map_or(u64::MAX, |(soft, _)| soft)
}

#[cfg(unix)]
/// Lowers the requested concurrency so that every in-flight probe can get
/// its descriptors under the current soft limit.
#[allow(clippy::cast_possible_truncation)]
fn infer_concurrency(opts: &Opts, ulimit: u64) -> usize {
    let requested = opts.concurrency as u64;
    let affordable = (ulimit.saturating_sub(RESERVED_FDS) / FDS_PER_PROBE).max(1);

    if requested <= affordable {
        return opts.concurrency;
    }

    warning!(
        format!(
            "File limit {ulimit} is too low for {requested} concurrent probes, using {affordable}. Raise it with --ulimit."
        ),
        opts.machine_readable(),
        opts.accessible
    );
    affordable as usize
}
