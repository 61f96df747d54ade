//! Line-oriented selection session over a single controller.

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use client_core::{
    view::{self, SortKey, SortState},
    ControllerError, SelectionController,
};
use shared::domain::ArticleId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{render, sink::DirectorySink};

const HELP: &str = "\
commands:
  refresh [location]   reload articles; 'all' drops the location filter
  search <text>        filter the table; empty text clears the filter
  sort <key>           sort by title, author, site_name, word_count, location, created_at
  select <id>...       check articles
  unselect <id>...     uncheck articles
  select-all           check every visible article
  deselect-all         uncheck everything
  stats                show the selection summary
  send                 bundle and deliver to the Kindle
  download             bundle and save the EPUB locally
  list                 print the table
  help                 show this text
  quit                 leave the session";

/// Location scope for `refresh`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Current,
    All,
    Location(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Empty,
    Refresh(Scope),
    Search(String),
    Sort(SortKey),
    Select(Vec<ArticleId>),
    Unselect(Vec<ArticleId>),
    SelectAll,
    DeselectAll,
    Stats,
    Send,
    Download,
    List,
    Help,
    Quit,
}

impl ShellCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let ids = || -> Result<Vec<ArticleId>, String> {
            let ids: Vec<ArticleId> = rest.split_whitespace().map(ArticleId::from).collect();
            if ids.is_empty() {
                Err(format!("usage: {verb} <id>..."))
            } else {
                Ok(ids)
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "" => Ok(Self::Empty),
            "refresh" | "r" => Ok(Self::Refresh(match rest {
                "" => Scope::Current,
                all if all.eq_ignore_ascii_case("all") => Scope::All,
                location => Scope::Location(location.to_string()),
            })),
            "search" | "/" => Ok(Self::Search(rest.to_string())),
            "sort" => rest.parse().map(Self::Sort),
            "select" | "s" => ids().map(Self::Select),
            "unselect" | "u" => ids().map(Self::Unselect),
            "select-all" => Ok(Self::SelectAll),
            "deselect-all" => Ok(Self::DeselectAll),
            "stats" => Ok(Self::Stats),
            "send" => Ok(Self::Send),
            "download" => Ok(Self::Download),
            "list" | "ls" => Ok(Self::List),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', type 'help'")),
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

pub struct Session {
    controller: Arc<SelectionController>,
    sink: DirectorySink,
    location: Option<String>,
    query: String,
    sort: SortState,
}

impl Session {
    pub fn new(controller: Arc<SelectionController>, sink: DirectorySink, location: Option<String>) -> Self {
        Self {
            controller,
            sink,
            location,
            query: String::new(),
            sort: SortState::default(),
        }
    }

    /// Reads commands from stdin until `quit`, end of input, or an auth
    /// challenge. The latter is returned as an error.
    pub async fn run(mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        self.step(ShellCommand::Refresh(Scope::Current)).await?;
        loop {
            stdout.write_all(b"digest> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let command = match ShellCommand::parse(&line) {
                Ok(command) => command,
                Err(message) => {
                    println!("{message}");
                    continue;
                }
            };
            if let Flow::Quit = self.step(command).await? {
                break;
            }
        }
        Ok(())
    }

    /// Runs one command; user-visible failures are printed and the session goes on.
    async fn step(&mut self, command: ShellCommand) -> Result<Flow, ControllerError> {
        match self.execute(command).await {
            Err(err) if err.is_user_visible() => {
                println!("Error: {err}");
                Ok(Flow::Continue)
            }
            other => other,
        }
    }

    async fn execute(&mut self, command: ShellCommand) -> Result<Flow, ControllerError> {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Refresh(scope) => {
                match scope {
                    Scope::Current => {}
                    Scope::All => self.location = None,
                    Scope::Location(location) => self.location = Some(location),
                }
                let count = self.controller.load(self.location.as_deref()).await?;
                println!("Loaded {count} articles");
            }
            ShellCommand::Search(query) => {
                self.query = query;
                self.print_table().await;
            }
            ShellCommand::Sort(key) => {
                self.sort.toggle(key);
                println!("Sorted by {} ({:?})", self.sort.key, self.sort.direction);
                self.print_table().await;
            }
            ShellCommand::Select(ids) => self.toggle_each(&ids, true).await?,
            ShellCommand::Unselect(ids) => self.toggle_each(&ids, false).await?,
            ShellCommand::SelectAll => {
                let collection = self.controller.collection().await;
                let visible = view::project(&collection, &self.query, self.sort);
                let stats = self.controller.select_all(&view::visible_ids(&visible)).await;
                println!("{}", render::selection_summary(&stats));
            }
            ShellCommand::DeselectAll => {
                let stats = self.controller.deselect_all().await;
                println!("{}", render::selection_summary(&stats));
            }
            ShellCommand::Stats => {
                let stats = self.controller.derived_stats().await;
                println!("{}", render::selection_summary(&stats));
                if let Some(bundle) = self.controller.bundle().await {
                    println!("Prepared bundle: {}", bundle.filename);
                }
            }
            ShellCommand::Send => {
                let outcome = self.controller.create_and_deliver().await?;
                println!("{}", render::delivery_message(&outcome));
            }
            ShellCommand::Download => {
                let outcome = self.controller.download(&self.sink).await?;
                println!("{}", render::download_message(&outcome));
            }
            ShellCommand::List => self.print_table().await,
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn toggle_each(&self, ids: &[ArticleId], is_selected: bool) -> Result<(), ControllerError> {
        let mut stats = None;
        for id in ids {
            match self.controller.set_selected(id, is_selected).await {
                Ok(latest) => stats = Some(latest),
                Err(err @ ControllerError::UnknownArticle(_)) => println!("Error: {err}"),
                Err(err) => return Err(err),
            }
        }
        if let Some(stats) = stats {
            println!("{}", render::selection_summary(&stats));
        }
        Ok(())
    }

    async fn print_table(&self) {
        let collection = self.controller.collection().await;
        let selected: HashSet<ArticleId> = self.controller.selected_ids().await.into_iter().collect();
        let visible = view::project(&collection, &self.query, self.sort);
        print!("{}", render::render_table(&visible, &selected));
        println!("{}", render::selection_summary(&self.controller.derived_stats().await));
    }
}

#[cfg(test)]
#[path = "tests/shell_tests.rs"]
mod tests;
