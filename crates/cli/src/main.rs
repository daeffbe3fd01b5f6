// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use telemq_cli::commands::queue::QueueArgs;
use telemq_cli::commands::{dump, inspect, reset, verify};

#[derive(Parser)]
#[command(name = "telemq")]
#[command(about = "Telemq offline tool - inspect and repair a device event queue")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show capacity, pointers and sequence state of a queue.
    Inspect {
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// List queued records oldest first.
    Dump {
        #[command(flatten)]
        queue: QueueArgs,

        /// Stop after this many records.
        #[arg(long, short)]
        limit: Option<usize>,

        /// Print one JSON object per record instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Decode every live slot and fail if any is damaged.
    Verify {
        #[command(flatten)]
        queue: QueueArgs,
    },
    /// Drop every queued record.
    Reset {
        #[command(flatten)]
        queue: QueueArgs,

        /// Also restart numbering after this index, as a topic change does.
        #[arg(long)]
        restart_from: Option<i64>,

        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { queue } => inspect::run(&queue),
        Commands::Dump { queue, limit, json } => dump::run(&queue, limit, json),
        Commands::Verify { queue } => verify::run(&queue),
        Commands::Reset {
            queue,
            restart_from,
            yes,
        } => reset::run(&queue, restart_from, yes),
    }
}
