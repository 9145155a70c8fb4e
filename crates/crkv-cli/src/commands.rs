use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use colored::Colorize;
use crkv_backend::FileBackend;
use crkv_store::{ensure_resource_type, Context, KeyValueStore, Store};
use crkv_types::{Key, KeyValue};
use serde_json::json;

use crate::cli::*;
use crate::config::{self, Resolved};

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let resolved = config::resolve(&cli)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute(&cli, resolved, &mut out).await
}

/// Run `cli.command` against the file store described by `resolved`.
pub async fn execute(cli: &Cli, resolved: Resolved, out: &mut impl Write) -> anyhow::Result<()> {
    let ctx = match cli.timeout_ms {
        Some(ms) => Context::with_timeout(Duration::from_millis(ms)),
        None => Context::background(),
    };
    let backend = Arc::new(
        FileBackend::open(&resolved.data_dir)
            .with_context(|| format!("opening data dir {}", resolved.data_dir.display()))?,
    );
    let resource_type = resolved.store.resource_type.clone();
    let retry = resolved.store.retry.clone();
    let store = Store::new(resolved.store, backend.clone())?;
    let format = cli.format;

    match &cli.command {
        Command::Init => {
            ensure_resource_type(&ctx, backend.as_ref(), &resource_type, &retry).await?;
            store.boot(&ctx).await?;
            cmd_provisioned(out, format, &store, "Initialized")
        }
        Command::Boot => {
            store.boot(&ctx).await?;
            cmd_provisioned(out, format, &store, "Booted")
        }
        Command::Exists(args) => {
            let key = parse_key(&args.key)?;
            let present = store.exists(&ctx, &key).await?;
            match format {
                OutputFormat::Json => write_json(out, &json!({ "key": key, "exists": present })),
                OutputFormat::Text => {
                    writeln!(out, "{present}")?;
                    Ok(())
                }
            }
        }
        Command::Get(args) => {
            let key = parse_key(&args.key)?;
            let kv = store.search(&ctx, &key).await?;
            match format {
                OutputFormat::Json => write_json(out, &kv),
                OutputFormat::Text => {
                    writeln!(out, "{}", kv.value)?;
                    Ok(())
                }
            }
        }
        Command::List(args) => {
            let prefix = parse_key(&args.prefix)?;
            let entries = store.list(&ctx, &prefix).await?;
            cmd_list(out, format, &entries)
        }
        Command::Put(args) => {
            let key = parse_key(&args.key)?;
            store.put(&ctx, &key, &args.value).await?;
            cmd_mutated(out, format, "put", &key)
        }
        Command::Delete(args) => {
            let key = parse_key(&args.key)?;
            store.delete(&ctx, &key).await?;
            cmd_mutated(out, format, "delete", &key)
        }
    }
}

fn parse_key(raw: &str) -> anyhow::Result<Key> {
    Key::new(raw).with_context(|| format!("invalid key {raw:?}"))
}

fn write_json(out: &mut impl Write, value: &impl serde::Serialize) -> anyhow::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_provisioned(
    out: &mut impl Write,
    format: OutputFormat,
    store: &Store,
    verb: &str,
) -> anyhow::Result<()> {
    let document = store.document();
    match format {
        OutputFormat::Json => write_json(
            out,
            &json!({ "namespace": document.namespace, "name": document.name }),
        ),
        OutputFormat::Text => {
            writeln!(
                out,
                "{} {} store {}",
                "✓".green().bold(),
                verb,
                document.to_string().bold()
            )?;
            Ok(())
        }
    }
}

fn cmd_list(
    out: &mut impl Write,
    format: OutputFormat,
    entries: &[KeyValue],
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, &entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                writeln!(out, "{}", "(no entries)".dimmed())?;
            }
            for kv in entries {
                writeln!(out, "{} = {}", kv.key.yellow(), kv.value)?;
            }
            Ok(())
        }
    }
}

fn cmd_mutated(
    out: &mut impl Write,
    format: OutputFormat,
    op: &str,
    key: &Key,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, &json!({ "op": op, "key": key })),
        OutputFormat::Text => {
            writeln!(out, "{} {} {}", "✓".green(), op, key.as_str().yellow())?;
            Ok(())
        }
    }
}
