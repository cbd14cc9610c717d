#![forbid(unsafe_code)]
//! Drive a ledger from the command line: register, fund, transfer, mine, show wallets.

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table};
use powledger::config::{load_config, DEFAULT_CONFIG_PATH};
use powledger::service::MinerService;
use powledger::transaction::amount_from_f64;
use powledger::{Ledger, MineOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ledger-sim", about = "Single-node proof-of-work ledger simulator")]
struct Args {
    /// TOML configuration file (defaults apply when absent)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Participant to register; repeat for more
    #[arg(short, long = "participant", value_name = "ID")]
    participants: Vec<String>,

    /// Mint an opening balance, e.g. alice=10
    #[arg(short, long = "fund", value_name = "ID=AMOUNT", value_parser = parse_fund)]
    funds: Vec<(String, f64)>,

    /// Submit a transfer, e.g. alice:bob:4
    #[arg(short, long = "transfer", value_name = "FROM:TO:AMOUNT", value_parser = parse_transfer)]
    transfers: Vec<(String, String, f64)>,

    /// Mining rounds to run after the transfers
    #[arg(short, long, default_value_t = 1)]
    blocks: u32,

    /// Give up on a round after this long, e.g. 5s or 500ms
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Keep sealing pending transactions every `miner.interval_ms` until Ctrl-C,
    /// instead of running `--blocks` rounds
    #[arg(long)]
    serve: bool,
}

fn parse_fund(s: &str) -> Result<(String, f64), String> {
    let (id, amount) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ID=AMOUNT, got {:?}", s))?;
    let amount = amount
        .parse::<f64>()
        .map_err(|e| format!("invalid amount {:?}: {}", amount, e))?;
    Ok((id.to_string(), amount))
}

fn parse_transfer(s: &str) -> Result<(String, String, f64), String> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected FROM:TO:AMOUNT, got {:?}", s));
    }
    let amount = parts[2]
        .parse::<f64>()
        .map_err(|e| format!("invalid amount {:?}: {}", parts[2], e))?;
    Ok((parts[0].to_string(), parts[1].to_string(), amount))
}

fn timeout_millis(timeout: Duration) -> Result<u64, String> {
    u64::try_from(timeout.as_millis()).map_err(|_| format!("timeout {:?} is too large", timeout))
}

fn show_wallets(ledger: &Ledger) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Participant").add_attribute(Attribute::Bold),
            Cell::new("Balance").add_attribute(Attribute::Bold),
        ]);
    for (id, balance) in ledger.list_balances() {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(format!("{:.6}", balance.to_num::<f64>())).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    println!(
        "{} {:.6}   {} {}",
        "Total supply:".bright_white(),
        ledger.total_supply().to_num::<f64>(),
        "Pending:".bright_white(),
        ledger.pending_count()
    );
}

async fn serve(ledger: Arc<Ledger>, interval: Duration) -> Result<u64, std::io::Error> {
    let service = MinerService::spawn(ledger, interval);
    println!(
        "{} every {} (Ctrl-C to stop)",
        "Sealing".bright_cyan(),
        humantime::format_duration(interval)
    );
    let signal = tokio::signal::ctrl_c().await;
    info!("Ctrl-C received, stopping miner service");
    let sealed = service.shutdown().await;
    signal.map(|()| sealed)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut config = load_config(&args.config)?;
    if let Some(timeout) = args.timeout {
        config.miner.timeout_ms = Some(timeout_millis(timeout)?);
    }
    let ledger = Arc::new(Ledger::new(&config)?);

    for requested in &args.participants {
        let identity = ledger.register(requested)?;
        if identity.id() == requested.as_str() {
            println!("{} {}", "Registered".green(), identity.id().bright_white());
        } else {
            println!(
                "{} {} {}",
                "Registered".green(),
                identity.id().bright_white(),
                format!("({} was taken)", requested).yellow()
            );
        }
    }

    for (id, amount) in &args.funds {
        ledger.credit(id, amount_from_f64(*amount)?)?;
    }

    for (sender, receiver, amount) in &args.transfers {
        let label = format!("{} -> {} : {}", sender, receiver, amount);
        let result = amount_from_f64(*amount)
            .and_then(|amount| ledger.submit_transfer(sender, receiver, amount));
        match result {
            Ok(()) => println!("{} {}", "✅ accepted".green(), label),
            Err(reason) => println!("{} {} ({})", "❌ rejected".red(), label, reason),
        }
    }

    if args.serve {
        let runtime = tokio::runtime::Runtime::new()?;
        let sealed = runtime.block_on(serve(ledger.clone(), config.miner.interval()))?;
        println!("{} {} blocks", "⛏️  sealed".bright_cyan().bold(), sealed);
        show_wallets(&ledger);
        return Ok(());
    }

    for round in 1..=args.blocks {
        let started = Instant::now();
        match ledger.mine()? {
            MineOutcome::Sealed(receipt) => {
                println!(
                    "{} block {} by {} (nonce {}, hash {}) in {:.3}s",
                    "⛏️  sealed".bright_cyan().bold(),
                    round,
                    receipt.winner.bright_white(),
                    receipt.nonce,
                    &receipt.hash[..16],
                    started.elapsed().as_secs_f64()
                );
                for rejection in &receipt.rejected {
                    println!(
                        "   {} {} ({})",
                        "dropped".yellow(),
                        rejection.transaction,
                        rejection.reason
                    );
                }
            }
            MineOutcome::NotFound { attempts, reason } => {
                println!(
                    "{} round {} ({:?} after {} attempts)",
                    "no block".yellow(),
                    round,
                    reason,
                    attempts
                );
            }
        }
    }

    show_wallets(&ledger);
    Ok(())
}
