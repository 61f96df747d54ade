use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use client_core::view::SortKey;

#[derive(Parser, Debug)]
#[command(name = "digest", about = "Bundle saved articles into an EPUB for your Kindle")]
pub struct Cli {
    /// Settings file; defaults to ./digest.toml when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub server_url: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the article table.
    List {
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        sort: Option<SortKey>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Bundle the chosen articles and mail them to the Kindle.
    Send(Selection),
    /// Bundle the chosen articles and save the EPUB locally.
    Download {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Interactive selection session.
    Shell {
        #[arg(long)]
        location: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct Selection {
    #[arg(long = "id", value_name = "ID", required_unless_present = "all", conflicts_with = "all")]
    pub ids: Vec<String>,
    /// Every article visible under --search.
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub location: Option<String>,
    #[arg(long)]
    pub search: Option<String>,
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
