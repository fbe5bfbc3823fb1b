use crate::config::Config;
use crate::poller::{EngineSignal, EngineState, Poller};
use crate::stats::{StatisticTable, StatsBundle};
use crate::transport::{HistoryFetcher, HttpFetcher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod config;
mod history;
mod poller;
mod stats;
mod transport;

use clap::{Parser, Subcommand};

// TUI Imports
use crossterm::{
    event::{self, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Row, Table},
};

/// Tracemon: Live statistics dashboard for a file-sharer tracing node
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll the tracer node and render live statistics in the terminal
    Watch {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Fetch one history snapshot and print the derived statistics
    Show {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Validate configuration file
    Validate {
        /// Path to the configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Watch {
        config: "config.toml".to_string(),
    }) {
        Commands::Watch { config } => run_watch(&config).await,
        Commands::Show { config } => run_show(&config).await,
        Commands::Validate { config } => validate_config(&config),
    }
}

fn validate_config(path: &str) -> anyhow::Result<()> {
    match Config::load(path) {
        Ok(cfg) => {
            info!("Configuration '{}' is valid.", path);
            info!("History endpoint: {}", cfg.engine.history_url());
            info!("Refresh interval: {}ms", cfg.engine.refresh_interval_ms);
            info!("Traced nodes: {}", cfg.nodes.len());
            for node in &cfg.nodes {
                info!("  {}", node.address());
            }
            Ok(())
        }
        Err(e) => {
            error!("Configuration '{}' is INVALID: {}", path, e);
            Err(anyhow::anyhow!("Invalid config"))
        }
    }
}

async fn run_show(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let fetcher = HttpFetcher::new(&config.engine);

    let state = tokio::sync::Mutex::new(EngineState::default());
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    poller::fetch_cycle(&fetcher, &state, config.nodes.len(), &tx).await;

    while let Ok(signal) = rx.try_recv() {
        if signal == EngineSignal::NavigateAway {
            println!("The node is running in file sharer mode; no trace history.");
            return Ok(());
        }
    }

    let st = state.lock().await;
    print_table("General Statistics", &st.tables.general);
    print_table("SER Message Statistics", &st.tables.ser);
    print_table("SER Super Peer Message Statistics", &st.tables.super_peer);
    Ok(())
}

fn print_table(title: &str, table: &StatisticTable) {
    println!("{title}");
    if table.is_empty() {
        println!("  (no data)");
    }
    for (label, value) in table.rows() {
        println!("  {label}: {value}");
    }
    println!();
}

async fn run_watch(config_path: &str) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    let fetcher: Arc<dyn HistoryFetcher> = Arc::new(HttpFetcher::new(&config.engine));

    info!("Watching trace history at {}", config.engine.history_url());

    let (mut poller, mut signals) = Poller::new(
        fetcher,
        config.nodes.len(),
        Duration::from_millis(config.engine.refresh_interval_ms),
    );
    poller.start();

    std::io::stdout().execute(EnterAlternateScreen)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;

    let mut bundle = StatsBundle::default();
    let mut navigated_away = false;

    loop {
        while let Ok(signal) = signals.try_recv() {
            match signal {
                EngineSignal::TablesUpdated(tables) => bundle = tables,
                EngineSignal::NavigateAway => navigated_away = true,
            }
        }
        if navigated_away {
            break;
        }

        terminal.draw(|frame| {
            let layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints(vec![
                    Constraint::Percentage(34),
                    Constraint::Percentage(33),
                    Constraint::Percentage(33),
                ])
                .split(frame.area());

            frame.render_widget(stat_table_widget("General", &bundle.general), layout[0]);
            frame.render_widget(stat_table_widget("SER Messages", &bundle.ser), layout[1]);
            frame.render_widget(
                stat_table_widget("SER Super Peer Messages", &bundle.super_peer),
                layout[2],
            );
        })?;

        if event::poll(std::time::Duration::from_millis(250))? {
            if let event::Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && key.code == KeyCode::Char('q') {
                    break;
                }
            }
        }
    }

    poller.stop();
    disable_raw_mode()?;
    std::io::stdout().execute(LeaveAlternateScreen)?;

    if navigated_away {
        println!("The node is back in file sharer mode; trace view closed.");
    }
    Ok(())
}

fn stat_table_widget<'a>(title: &'a str, table: &StatisticTable) -> Table<'a> {
    let rows: Vec<Row> = table
        .rows()
        .iter()
        .map(|(label, value)| Row::new(vec![label.clone(), value.clone()]))
        .collect();

    Table::new(
        rows,
        [Constraint::Percentage(60), Constraint::Percentage(40)],
    )
    .block(Block::default().borders(Borders::ALL).title(title))
}
