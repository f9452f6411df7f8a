//! `cascade`: merge config sources and print the result.

use anyhow::{Context, anyhow, bail};
use cascade_rs::{
    CodecRegistry, Config, Feature, KeyPath, Source, TreeNode, WatchOptions, full_registry,
    init_logging,
};
use clap::Parser;
use log::{debug, info, warn};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

/// Command-line options.
#[derive(Parser, Debug)]
#[command(name = "cascade", version)]
struct Cli {
    /// Files or URLs, lowest precedence first
    sources: Vec<String>,
    /// Format used for every source instead of the file extension
    #[arg(long)]
    input_format: Option<String>,
    /// Output format
    #[arg(long, short = 'f', default_value = "json")]
    format: String,
    /// Layer environment variables with this prefix over the sources
    #[arg(long)]
    env_prefix: Option<String>,
    /// `key=value` overrides applied last
    #[arg(long = "set", short = 'D', value_name = "KEY=VALUE")]
    overrides: Vec<String>,
    /// Print only the value at this dotted path
    #[arg(long)]
    get: Option<String>,
    /// Skip sources that do not exist
    #[arg(long)]
    optional: bool,
    /// Resolve `${path}` references inside values
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    substitute: bool,
    /// Keep running and print again whenever a source changes
    #[arg(long)]
    watch: bool,
    /// Poll interval in milliseconds for --watch
    #[arg(long, default_value_t = 2000)]
    interval_ms: u64,
}

/// Entry point for the cascade CLI.
fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    info!(
        "starting cascade (sources={}, format={}, watch={})",
        cli.sources.len(),
        cli.format,
        cli.watch
    );

    let registry = full_registry();
    let output = Output::new(&registry, &cli)?;
    let watch = cli.watch.then(|| {
        let output = output.clone();
        WatchOptions::new()
            .with_interval(Duration::from_millis(cli.interval_ms))
            .on_reload(move |config| {
                if let Err(err) = output.print(config) {
                    warn!("failed to print reloaded config (error={err:#})");
                }
            })
    });

    let config = load(&cli, &registry, watch)?;
    output.print(&config)?;

    if cli.watch {
        info!("watching sources (count={})", config.watches().len());
        loop {
            std::thread::park();
        }
    }
    Ok(())
}

/// Build the merged config described by `cli`.
fn load(
    cli: &Cli,
    registry: &CodecRegistry,
    watch: Option<WatchOptions>,
) -> anyhow::Result<Config> {
    let mut builder = Config::builder();
    if cli.optional {
        builder = builder.enable(Feature::OptionalSourceOnNotFound);
    }
    if !cli.substitute {
        builder = builder.disable(Feature::SubstituteSourceBeforeLoaded);
    }
    let mut config = builder.build()?;

    let fixed = match &cli.input_format {
        Some(format) => Some(
            registry
                .get(format)
                .ok_or_else(|| anyhow!("unknown input format {format}"))?,
        ),
        None => None,
    };

    for source in &cli.sources {
        let loader = match &fixed {
            Some(codec) => config.from(Arc::clone(codec)),
            None => config.from_registry(registry.clone()),
        };
        let is_url = source.contains("://");
        debug!("loading source (source={source}, url={is_url})");
        config = match (&watch, is_url) {
            (Some(options), true) => loader.watch_url_str(source, options.clone()),
            (Some(options), false) => loader.watch_file_path(source, options.clone()),
            (None, true) => loader.url_str(source),
            (None, false) => loader.file_path(source),
        }
        .with_context(|| format!("failed to load {source}"))?;
    }

    if let Some(prefix) = &cli.env_prefix {
        config = config.with_source(Source::from_env(Some(prefix)))?;
    }
    if !cli.overrides.is_empty() {
        config = config
            .with_source(Source::from_properties(&cli.overrides)?)
            .context("invalid --set override")?;
    }
    Ok(config)
}

/// Renders a config, or one path of it, in the chosen format.
#[derive(Clone)]
struct Output {
    codec: Arc<dyn cascade_rs::Codec>,
    path: Option<KeyPath>,
}

impl Output {
    fn new(registry: &CodecRegistry, cli: &Cli) -> anyhow::Result<Self> {
        let Some(codec) = registry.get(&cli.format) else {
            bail!(
                "unknown output format {} (known: {})",
                cli.format,
                registry.extensions().join(", ")
            );
        };
        Ok(Self {
            codec,
            path: cli.get.as_deref().map(KeyPath::parse),
        })
    }

    fn render(&self, config: &Config) -> anyhow::Result<Vec<u8>> {
        let tree = config.to_tree()?;
        let Some(path) = &self.path else {
            return Ok(self.codec.serialize(&tree)?);
        };
        match tree.get(path) {
            Some(node @ TreeNode::Scalar(_)) => Ok(format!("{node}\n").into_bytes()),
            Some(node) => Ok(self.codec.serialize(node)?),
            None => bail!("no value at {path}"),
        }
    }

    fn print(&self, config: &Config) -> anyhow::Result<()> {
        let bytes = self.render(config)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(&bytes)?;
        if !bytes.ends_with(b"\n") {
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_rs_test_utils::TempSourceDir;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cascade").chain(args.iter().copied()))
            .expect("arguments")
    }

    fn render(cli: &Cli) -> String {
        let registry = full_registry();
        let config = load(cli, &registry, None).expect("load");
        let output = Output::new(&registry, cli).expect("output");
        String::from_utf8(output.render(&config).expect("render")).expect("utf-8")
    }

    /// Sources are layered in argument order, `-D` last.
    #[test]
    fn later_sources_and_overrides_win() {
        let dir = TempSourceDir::new();
        let base = dir.write("base.yaml", "server:\n  host: base\n  port: 80\n");
        let local = dir.write("local.properties", "server.port = 8080\n");
        let args = cli(&[
            base.to_str().expect("path"),
            local.to_str().expect("path"),
            "-D",
            "server.host=cli",
            "--get",
            "server",
        ]);
        let rendered: serde_json::Value =
            serde_json::from_str(&render(&args)).expect("json output");
        assert_eq!(
            rendered,
            serde_json::json!({ "host": "cli", "port": "8080" })
        );
    }

    #[test]
    fn subtrees_use_the_output_format() {
        let dir = TempSourceDir::new();
        let base = dir.write("app.yaml", "server:\n  host: h\n  port: 80\nother: x\n");
        let args = cli(&[
            base.to_str().expect("path"),
            "--get",
            "server",
            "-f",
            "properties",
        ]);
        assert_eq!(render(&args), "host = h\nport = 80\n");
    }

    /// A scalar printed with `--get` is the bare value.
    #[test]
    fn scalar_paths_print_plain() {
        let dir = TempSourceDir::new();
        let base = dir.write("app.toml", "[db]\nurl = \"postgres://db\"\n");
        let args = cli(&[base.to_str().expect("path"), "--get", "db.url"]);
        assert_eq!(render(&args), "postgres://db\n");
    }

    /// Absent files abort the run unless `--optional` is given.
    #[test]
    fn missing_sources_need_the_optional_flag() {
        let dir = TempSourceDir::new();
        let missing = dir.path().join("absent.json");
        let missing = missing.to_str().expect("path");
        let registry = full_registry();
        assert!(load(&cli(&[missing]), &registry, None).is_err());
        let config = load(&cli(&[missing, "--optional"]), &registry, None).expect("optional");
        assert_eq!(config.layers().len(), 1);
    }

    #[test]
    fn unknown_formats_are_rejected() {
        let registry = full_registry();
        assert!(Output::new(&registry, &cli(&["-f", "ini"])).is_err());
        assert!(load(&cli(&["x.conf", "--input-format", "ini"]), &registry, None).is_err());
    }

    /// `--substitute false` keeps `${...}` references as written.
    #[test]
    fn substitution_can_be_turned_off() {
        let dir = TempSourceDir::new();
        let base = dir.write("app.json", r#"{ "a": "x", "b": "${a}" }"#);
        let path = base.to_str().expect("path");
        assert_eq!(render(&cli(&[path, "--get", "b"])), "x\n");
        assert_eq!(
            render(&cli(&[path, "--get", "b", "--substitute", "false"])),
            "${a}\n"
        );
    }
}
