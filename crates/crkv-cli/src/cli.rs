use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "crkv",
    about = "Hierarchical key-value store kept in a single versioned document",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with `[store]` and `[backend]` sections
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the document files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Name of the backing document
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Abort the command after this many milliseconds
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Register the resource type, then provision the store
    Init,
    /// Provision the namespace and backing document
    Boot,
    /// Report whether a key is present
    Exists(KeyArgs),
    /// Print the value stored at a key
    Get(KeyArgs),
    /// List entries under a prefix
    List(ListArgs),
    /// Set a key, overwriting any previous value
    Put(PutArgs),
    /// Remove a key
    Delete(KeyArgs),
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(default_value = "/")]
    pub prefix: String,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["crkv", "init"]).unwrap();
        assert!(matches!(cli.command, Command::Init));
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from(["crkv", "put", "/foo/bar", "baz"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.key, "/foo/bar");
            assert_eq!(args.value, "baz");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_put_requires_value() {
        assert!(Cli::try_parse_from(["crkv", "put", "/foo"]).is_err());
    }

    #[test]
    fn parse_list_defaults_to_root() {
        let cli = Cli::try_parse_from(["crkv", "list"]).unwrap();
        if let Command::List(args) = cli.command {
            assert_eq!(args.prefix, "/");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "crkv", "get", "/k", "--namespace", "kv", "--name", "main", "--timeout-ms", "250",
        ])
        .unwrap();
        assert_eq!(cli.namespace.as_deref(), Some("kv"));
        assert_eq!(cli.name.as_deref(), Some("main"));
        assert_eq!(cli.timeout_ms, Some(250));
        assert!(matches!(cli.command, Command::Get(_)));
    }

    #[test]
    fn parse_data_dir_and_config() {
        let cli = Cli::try_parse_from([
            "crkv", "--config", "crkv.toml", "--data-dir", "/tmp/kv", "boot",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("crkv.toml")));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/kv")));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::try_parse_from(["crkv", "-v", "exists", "/a"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["crkv", "--format", "json", "delete", "/a"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
