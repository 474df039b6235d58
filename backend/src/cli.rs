//! Minimal CLI parsing for the schema tool.

use std::env;
use std::path::PathBuf;

pub const USAGE: &str =
    "usage: modelgraph [--print-schema] [--query <file> [--variables <file>]]";

#[derive(Debug, Default, PartialEq)]
pub struct CliOptions {
    /// Print the schema SDL to stdout
    pub print_schema: bool,
    /// GraphQL document to execute
    pub query: Option<PathBuf>,
    /// JSON variables for `query`
    pub variables: Option<PathBuf>,
    pub help: bool,
}

impl CliOptions {
    pub fn from_args() -> Self {
        Self::parse(env::args().skip(1))
    }

    pub fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--print-schema" => options.print_schema = true,
                "--help" | "-h" => options.help = true,
                "--query" => options.query = args.next().map(PathBuf::from),
                "--variables" => options.variables = args.next().map(PathBuf::from),
                _ if arg.starts_with("--query=") => {
                    options.query = arg.split_once('=').map(|(_, v)| PathBuf::from(v));
                }
                _ if arg.starts_with("--variables=") => {
                    options.variables = arg.split_once('=').map(|(_, v)| PathBuf::from(v));
                }
                _ => {}
            }
        }
        options
    }

    /// Whether there is anything to do
    pub fn has_action(&self) -> bool {
        self.print_schema || self.query.is_some()
    }
}
