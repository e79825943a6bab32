use crate::ledger::{Order, STARTING_BALANCE};
use crate::metrics::long_format;
use crate::report::format_currency;
use crate::session::Session;
use crate::tui::Component;

use clap::{arg, value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use eyre::WrapErr;
use serde::Deserialize;
use serde::Serialize;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod error;
mod ledger;
mod metrics;
mod price_table;
mod report;
mod session;
mod tui;

const APP_NAME: &str = "tradesim";

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    data_file: String,
    currency: String,
    starting_balance: f64,
    log_file: String,
    disabled_components: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: "market_data.csv".to_string(),
            currency: "SAR".to_string(),
            starting_balance: STARTING_BALANCE,
            log_file: "tradesim.log".to_string(),
            disabled_components: Vec::new(),
        }
    }
}

fn file_arg() -> Arg {
    arg!(<FILE> "CSV file with the price history")
        .required(false)
        .default_value("")
}

fn balance_arg() -> Arg {
    arg!(--balance <AMOUNT> "Starting cash balance (overrides the config)")
        .required(false)
        .value_parser(value_parser!(f64))
}

fn cli() -> Command {
    Command::new("tradesim_rs")
        .about("Simulated share trading against a historical price table")
        .author("Markus Zoppelt")
        .arg_required_else_help(true)
        .subcommand(Command::new("config").about("Print the path to the config file"))
        .subcommand(
            Command::new("summary")
                .about("Show the latest price and change of every group")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Print the price history in long format as JSON")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run purchases against a fresh ledger and show the resulting holdings")
                .arg(file_arg())
                .arg(balance_arg())
                .arg(
                    Arg::new("buy")
                        .long("buy")
                        .value_name("GROUP:QTY")
                        .help("Purchase to execute, can be repeated")
                        .action(ArgAction::Append)
                        .value_parser(value_parser!(Order)),
                ),
        )
        .subcommand(
            Command::new("tui")
                .about("Open the interactive trading dashboard")
                .arg(file_arg())
                .arg(balance_arg()),
        )
}

// argument first, then the config file
fn resolve_data_file(matches: &ArgMatches, cfg: &Config) -> Option<String> {
    let mut filename = String::new();
    if let Ok(Some(f)) = matches.try_get_one::<String>("FILE") {
        filename = f.to_string();
    }
    if filename.is_empty() {
        filename.clone_from(&cfg.data_file);
    }
    if filename.is_empty() {
        None
    } else {
        Some(filename)
    }
}

fn starting_balance(matches: &ArgMatches, cfg: &Config) -> f64 {
    matches
        .try_get_one::<f64>("balance")
        .ok()
        .flatten()
        .copied()
        .unwrap_or(cfg.starting_balance)
}

// The dashboard owns the terminal, so it logs to a file. Everything else logs
// warnings to stderr.
fn init_tracing(log_file: Option<&str>) -> eyre::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("Could not open log file {path}"))?;
            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    format!("{}=info", env!("CARGO_CRATE_NAME")).into()
                }))
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

fn simulate(mut session: Session, matches: &ArgMatches, currency: &str) {
    let orders: Vec<Order> = matches
        .get_many::<Order>("buy")
        .map(|orders| orders.cloned().collect())
        .unwrap_or_default();

    for order in &orders {
        match session.execute_purchase(&order.group, order.quantity) {
            Ok(p) => println!(
                "{} {} x {} at {} = {} | holding {} | balance {}",
                "BUY ".green().bold(),
                p.quantity,
                p.group,
                format_currency(p.price, currency),
                format_currency(p.cost, currency),
                p.holding,
                format_currency(p.balance, currency)
            ),
            Err(e) => {
                info!(group = %order.group, quantity = order.quantity, error = %e, "order skipped");
                println!(
                    "{} {} x {}: {}",
                    "SKIP".red().bold(),
                    order.quantity,
                    order.group,
                    e
                );
            }
        }
    }

    report::print_holdings(&session, currency);
    if !session.non_zero_holdings().is_empty() {
        report::draw_allocation(&session);
    }
}

fn main() -> eyre::Result<()> {
    let cfg: Config = confy::load(APP_NAME, "config").wrap_err("Could not load the config file")?;

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("config", _)) => {
            let path = confy::get_configuration_file_path(APP_NAME, "config")?;
            println!("Your config file is located here: \n{}", path.display());
            println!("\nComponents that can be listed in disabled_components:");
            for component in Component::all() {
                println!(
                    "  {:<12} {}",
                    component.as_str().bold(),
                    component.description()
                );
            }
        }
        Some((name, sub)) => {
            if name == "tui" {
                if !cfg.log_file.is_empty() {
                    init_tracing(Some(&cfg.log_file))?;
                }
            } else {
                init_tracing(None)?;
            }

            let Some(filename) = resolve_data_file(sub, &cfg) else {
                cli().print_help()?;
                return Ok(());
            };

            let session = Session::open(&filename, starting_balance(sub, &cfg))
                .wrap_err_with(|| format!("Could not start a session from {filename}"))?;

            match name {
                "summary" => report::print_summary(session.table(), &cfg.currency),
                "export" => {
                    let json = serde_json::to_string_pretty(&long_format(session.table()))?;
                    println!("{json}");
                }
                "simulate" => simulate(session, sub, &cfg.currency),
                "tui" => tui::run_tui(session, cfg.currency, &cfg.disabled_components)?,
                _ => (),
            }
        }
        None => (),
    }

    Ok(())
}
