//! Request grammar.
//!
//! A request line is first split into tokens by the dialect of the session:
//! [`v2`] is a shell-like tokenizer, [`v1`] the older bracketed syntax
//! (`search hello [source=xiami]  #: format=json`). Both produce the same
//! argv, which is then parsed by the `clap` definition below, so every
//! command has a single set of arguments and a single help text.

pub mod v1;
pub mod v2;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

use crate::error::{Result, ServiceError};
use crate::protocol::ProtocolVersion;

/// Response encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Plain,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "fuo",
    no_binary_name = true,
    disable_help_subcommand = true,
    disable_version_flag = true
)]
struct RequestLine {
    /// Response format
    #[arg(long, global = true, value_enum)]
    format: Option<Format>,

    /// Same as --format=json
    #[arg(long, global = true)]
    json: bool,

    /// Same as --format=plain
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show player status
    Status,
    /// Play a song or playlist URI, an http URL, or the best match of a keyword
    Play {
        #[arg(required = true)]
        target: Vec<String>,
    },
    /// Pause the player
    Pause,
    /// Resume the player
    Resume,
    /// Toggle between playing and paused
    Toggle,
    /// Stop the player
    Stop,
    /// Play the next song
    Next,
    /// Play the previous song
    Previous,
    /// Search every provider
    Search {
        #[arg(required = true)]
        keyword: Vec<String>,
        /// Provider ids, comma separated or repeated
        #[arg(short, long = "source")]
        sources: Vec<String>,
        /// song, album, artist, playlist or video
        #[arg(short, long = "type")]
        types: Vec<String>,
    },
    /// Show a resource, `fuo://` lists the providers
    Show { uri: Option<String> },
    /// List the songs of the playlist
    List,
    /// Remove every song from the playlist
    Clear,
    /// Add songs, or the songs of an album or playlist, to the playlist
    Add { uris: Vec<String> },
    /// Remove a song from the playlist
    Remove { uri: String },
    /// Run one registered method per line: `method [json args...]`
    Exec { code: Option<String> },
    /// Handle a JSON-RPC 2.0 request against the registered methods
    Jsonrpc { body: Option<String> },
    /// Change options of this session
    Set {
        #[arg(long)]
        rpc_version: Option<String>,
        #[arg(long)]
        pubsub_version: Option<String>,
    },
    /// Show the help of a command
    Help { cmd: Option<String> },
    /// Subscribe this session to the topics matching the patterns
    Sub {
        #[arg(required = true)]
        topics: Vec<String>,
    },
    /// Close the connection
    Quit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Status => "status",
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Toggle => "toggle",
            Command::Stop => "stop",
            Command::Next => "next",
            Command::Previous => "previous",
            Command::Search { .. } => "search",
            Command::Show { .. } => "show",
            Command::List => "list",
            Command::Clear => "clear",
            Command::Add { .. } => "add",
            Command::Remove { .. } => "remove",
            Command::Exec { .. } => "exec",
            Command::Jsonrpc { .. } => "jsonrpc",
            Command::Set { .. } => "set",
            Command::Help { .. } => "help",
            Command::Sub { .. } => "sub",
            Command::Quit => "quit",
        }
    }
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub format: Format,
}

impl Request {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            format: Format::Plain,
        }
    }
}

/// A tokenized request line whose heredoc, if any, is still unread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub argv: Vec<String>,
    pub heredoc_word: Option<String>,
}

impl RawRequest {
    pub fn heredoc_word(&self) -> Option<&str> {
        self.heredoc_word.as_deref()
    }

    /// Parse the argv, the heredoc body being the last positional argument.
    pub fn into_request(self, heredoc: Option<String>) -> Result<Request> {
        let mut argv = self.argv;
        argv.extend(heredoc);
        parse_argv(argv)
    }
}

/// Tokenize `line` with the grammar of `version`.
pub fn parse_line(line: &str, version: ProtocolVersion) -> Result<RawRequest> {
    match version {
        ProtocolVersion::V1 => v1::parse(line),
        ProtocolVersion::V2 => v2::parse(line),
    }
}

/// Parse a request that has no heredoc.
pub fn parse_request(line: &str, version: ProtocolVersion) -> Result<Request> {
    let raw = parse_line(line, version)?;
    if raw.heredoc_word.is_some() {
        return Err(ServiceError::syntax("heredoc is not allowed here"));
    }
    raw.into_request(None)
}

fn parse_argv(argv: Vec<String>) -> Result<Request> {
    match RequestLine::try_parse_from(&argv) {
        Ok(line) => {
            let format = if line.json {
                Format::Json
            } else if line.plain {
                Format::Plain
            } else {
                line.format.unwrap_or_default()
            };
            Ok(Request {
                command: line.command,
                format,
            })
        }
        Err(err) if err.kind() == ErrorKind::DisplayHelp => {
            // `<cmd> --help` is answered like `help <cmd>`.
            let cmd = argv.first().filter(|a| !a.starts_with('-')).cloned();
            Ok(Request::new(Command::Help { cmd }))
        }
        Err(err) => Err(ServiceError::syntax(err.render().to_string().trim_end())),
    }
}

/// Help text of `cmd`, or the command list.
pub fn help_text(cmd: Option<&str>) -> Result<String> {
    let mut root = RequestLine::command();
    root.build();
    let text = match cmd {
        None => root.render_help(),
        Some(name) => root
            .find_subcommand_mut(name)
            .ok_or_else(|| ServiceError::handler(format!("unknown command '{name}'")))?
            .render_help(),
    };
    Ok(text.to_string().trim_end().to_string())
}
