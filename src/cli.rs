use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (REST api and MCP over HTTP).
    Serve {
        /// Address to listen on. Defaults to `server.bind` from config,
        /// with the port taken from $PORT when set.
        #[clap(short, long)]
        bind: Option<String>,
    },

    /// Serve MCP over stdin/stdout.
    Stdio {},

    /// Recommend MCP connectors for a request
    Find {
        /// What you want to do, in plain words
        #[clap(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Print the raw result as json
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Show how to add an MCP connector
    Add {
        /// Connector id, as shown by `find`
        id: String,

        /// Print the raw result as json
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Regenerate the catalog cache now, ignoring its age.
    Refresh {},
}
