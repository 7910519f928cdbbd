//! Thin CLI exercising the engine crates directly, standing in for the
//! external hub transport for local/manual use the same way `oj`
//! exercises `oj-daemon`'s engine crates from the command line.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use manlab_adapters::{NoOpArpAdapter, NoOpGeoAdapter, NoOpOuiAdapter};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "manlab", about = "Network-operations toolkit", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Single ICMP echo probe
    Ping {
        address: Ipv4Addr,
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
    /// CIDR sweep with host discovery and enrichment
    Sweep {
        /// CIDR block, e.g. 192.168.1.0/24
        block: String,
        #[arg(long, default_value_t = 64)]
        concurrency: usize,
    },
    /// Ascending-TTL traceroute
    Traceroute {
        address: Ipv4Addr,
        #[arg(long, default_value_t = 30)]
        max_hops: u8,
    },
    /// TCP port scan
    Portscan {
        address: IpAddr,
        /// Ports to probe; defaults to the common-ports list
        #[arg(long, value_delimiter = ',')]
        ports: Option<Vec<u16>>,
        #[arg(long, default_value_t = 500)]
        timeout_ms: u64,
        #[arg(long, default_value_t = 100)]
        concurrency: usize,
    },
    /// Forward/reverse DNS lookup
    Dns {
        name: String,
        #[arg(long)]
        reverse: bool,
    },
    /// WHOIS lookup
    Whois { query: String },
    /// Send a Wake-on-LAN magic packet
    Wol {
        mac: String,
        #[arg(long, default_value = manlab_scanner::DEFAULT_WOL_BROADCAST)]
        broadcast: String,
        #[arg(long, default_value_t = manlab_scanner::DEFAULT_WOL_PORT)]
        port: u16,
    },
    /// Inspect a TLS certificate chain
    TlsInspect {
        host: String,
        #[arg(long, default_value_t = 443)]
        port: u16,
    },
    /// Query this host's public IP
    PublicIp {},
    /// Run an ndt7 speed test against an M-Lab server
    Speedtest {
        #[arg(long, default_value = manlab_speedtest::DEFAULT_LOCATE_BASE)]
        locate_base: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Ping { address, timeout_ms } => {
            let result = manlab_scanner::ping(address, timeout_ms).await;
            println!("{:?}", result);
        }
        Command::Sweep { block, concurrency } => {
            let options = manlab_scanner::SubnetScanOptions { concurrency, ..Default::default() };
            let mut rx = manlab_scanner::scan_subnet(&block, options, Arc::new(NoOpArpAdapter), Arc::new(NoOpOuiAdapter))?;
            while let Some(host) = rx.recv().await {
                println!("{:?}", host);
            }
        }
        Command::Traceroute { address, max_hops } => {
            let options = manlab_scanner::TraceRouteOptions { max_hops, ..Default::default() };
            let result = manlab_scanner::trace_route(address, options, Arc::new(NoOpGeoAdapter), |hop| {
                println!("{:?}", hop);
            })
            .await;
            println!("{:?}", result);
        }
        Command::Portscan { address, ports, timeout_ms, concurrency } => {
            let ports = ports.unwrap_or_else(|| manlab_scanner::DEFAULT_PORTS.to_vec());
            let result = manlab_scanner::scan_ports(address, &ports, timeout_ms, concurrency).await;
            println!("{:?}", result);
        }
        Command::Dns { name, reverse } => {
            let result = manlab_scanner::dns_lookup(&name, reverse).await;
            println!("{:?}", result);
        }
        Command::Whois { query } => {
            let result = manlab_scanner::whois(&query).await.map_err(|e| anyhow!(e))?;
            println!("{result}");
        }
        Command::Wol { mac, broadcast, port } => {
            manlab_scanner::wake_on_lan(&mac, &broadcast, port).await.map_err(|e| anyhow!(e))?;
            println!("magic packet sent to {mac}");
        }
        Command::TlsInspect { host, port } => {
            let result = manlab_scanner::inspect_certificate(&host, port).await.map_err(|e| anyhow!(e))?;
            println!("{:?}", result);
        }
        Command::PublicIp {} => {
            let result = manlab_scanner::get_public_ip().await.map_err(|e| anyhow!(e))?;
            print_json(&serde_json::json!({
                "ipv4": result.v4.map(|r| r.address.to_string()),
                "ipv6": result.v6.map(|r| r.address.to_string()),
            }))?;
        }
        Command::Speedtest { locate_base } => {
            let options = manlab_speedtest::SpeedTestOptions { locate_base, ..Default::default() };
            let result = manlab_speedtest::run_speed_test(options, |event| println!("{:?}", event)).await;
            println!("{:?}", result);
        }
    }

    Ok(())
}
