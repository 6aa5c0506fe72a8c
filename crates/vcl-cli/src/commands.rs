use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use colored::Colorize;
use serde::Serialize;
use vcl_archive::{ArchiveWriter, Method};
use vcl_loader::VfsClassLoader;
use vcl_registry::{RegistryConfig, Resolver, StoreRegistry};
use vcl_store::{classify_read_error, FileHandle};
use vcl_types::{class_name_for, ContentDigest, FileType};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => RegistryConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RegistryConfig::default(),
    };
    match cli.command {
        Command::Pack(args) => cmd_pack(args),
        Command::Ls(args) => cmd_ls(&config, args, &cli.format),
        Command::Cat(args) => cmd_cat(&config, args),
        Command::Load(args) => cmd_load(&config, args),
        Command::Stress(args) => cmd_stress(&config, args),
    }
}

fn resolver(config: &RegistryConfig) -> Resolver {
    Resolver::new(Arc::new(StoreRegistry::with_config(config)))
}

fn cmd_pack(args: PackArgs) -> anyhow::Result<()> {
    let method = if args.store { Method::Stored } else { Method::Zstd };
    let mut writer = ArchiveWriter::new()
        .with_method(method)
        .with_level(args.level);
    let files = writer
        .add_tree(&args.dir)
        .with_context(|| format!("reading {}", args.dir.display()))?;
    let archive = writer.write_to(&args.out)?;
    println!(
        "{} Packed {} files into {}",
        "✓".green().bold(),
        files,
        archive.path.display().to_string().bold()
    );
    println!("  Entries: {}", archive.entry_count);
    println!("  Checksum: {}", archive.checksum.short_hex().cyan());
    Ok(())
}

#[derive(Serialize)]
struct Listing {
    uri: String,
    file_type: FileType,
    size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    class: Option<String>,
}

impl From<&FileHandle> for Listing {
    fn from(handle: &FileHandle) -> Self {
        Self {
            uri: handle.uri().to_string(),
            file_type: handle.file_type(),
            size: handle.size(),
            class: class_name_for(handle.path()),
        }
    }
}

fn cmd_ls(config: &RegistryConfig, args: LsArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let resolver = resolver(config);
    let _scope = resolver.registry().scope();
    let handle = resolver.resolve_file(&args.uri)?;
    let entries = if handle.is_directory() {
        handle.children()?
    } else {
        vec![handle]
    };

    match format {
        OutputFormat::Json => {
            let listing: Vec<Listing> = entries.iter().map(Listing::from).collect();
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        OutputFormat::Text => {
            for entry in &entries {
                let name = entry.path().file_name().unwrap_or("/");
                if entry.is_directory() {
                    println!("{:>10}  {}/", "-".dimmed(), name.blue().bold());
                } else if let Some(class) = class_name_for(entry.path()) {
                    println!("{:>10}  {}  {}", entry.size(), name, class.dimmed());
                } else {
                    println!("{:>10}  {}", entry.size(), name);
                }
            }
        }
    }
    Ok(())
}

fn cmd_cat(config: &RegistryConfig, args: CatArgs) -> anyhow::Result<()> {
    let resolver = resolver(config);
    let _scope = resolver.registry().scope();
    let handle = resolver.resolve_file(&args.uri)?;
    let mut stream = handle.open_content()?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    std::io::copy(&mut stream, &mut out)
        .map_err(|e| classify_read_error(&args.uri, e))?;
    out.flush()?;
    Ok(())
}

fn cmd_load(config: &RegistryConfig, args: LoadArgs) -> anyhow::Result<()> {
    let expected = args
        .expect_digest
        .as_deref()
        .map(ContentDigest::from_hex)
        .transpose()
        .context("parsing --expect-digest")?;
    let resolver = resolver(config);
    let _scope = resolver.registry().scope();
    let loader = VfsClassLoader::new(resolver.clone(), args.roots.as_slice())?;
    match loader.load_class(&args.class)? {
        Some(class) => {
            check_digest(&class.name, expected, class.digest)?;
            println!("{} Loaded {}", "✓".green().bold(), class.name.yellow().bold());
            println!("  Source: {}", class.source);
            println!("  Size: {} bytes", class.len);
            println!("  Digest: {}", class.digest.short_hex().cyan());
            Ok(())
        }
        None => bail!("class not found: {}", args.class),
    }
}

fn check_digest(
    name: &str,
    expected: Option<ContentDigest>,
    actual: ContentDigest,
) -> anyhow::Result<()> {
    match expected {
        Some(expected) if expected != actual => bail!(
            "digest mismatch for {name}: expected {}, got {}",
            expected.to_hex(),
            actual.to_hex()
        ),
        _ => Ok(()),
    }
}

/// Outcome of one [`run_stress`] call.
#[derive(Debug, Default)]
pub(crate) struct StressReport {
    pub loads: usize,
    pub failures: Vec<String>,
    pub elapsed: Duration,
}

/// Each run builds a fresh registry, `loaders` loaders over `root`, and has
/// a pool of `threads` workers load `class` `rounds` times per loader.
pub(crate) fn run_stress(config: &RegistryConfig, args: &StressArgs) -> anyhow::Result<StressReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.max(1))
        .build()?;
    let started = Instant::now();
    let mut report = StressReport::default();

    for run in 0..args.repeat {
        let resolver = resolver(config);
        let _scope = resolver.registry().scope();
        let loaders = (0..args.loaders)
            .map(|_| VfsClassLoader::new(resolver.clone(), &[args.root.as_str()]))
            .collect::<Result<Vec<_>, _>>()?;

        let tasks = args.rounds * loaders.len();
        let outcomes: Vec<_> = pool.install(|| {
            use rayon::prelude::*;
            (0..tasks)
                .into_par_iter()
                .map(|task| loaders[task % loaders.len()].load_class(&args.class))
                .collect()
        });

        for outcome in outcomes {
            report.loads += 1;
            match outcome {
                Ok(Some(_)) => {}
                Ok(None) => report
                    .failures
                    .push(format!("run {run}: class not found: {}", args.class)),
                Err(err) => report.failures.push(format!("run {run}: {err}")),
            }
        }
    }
    report.elapsed = started.elapsed();
    Ok(report)
}

fn cmd_stress(config: &RegistryConfig, args: StressArgs) -> anyhow::Result<()> {
    let report = run_stress(config, &args)?;
    if !report.failures.is_empty() {
        for failure in &report.failures {
            println!("  {} {}", "✗".red(), failure);
        }
        bail!("{} of {} loads failed", report.failures.len(), report.loads);
    }
    println!(
        "{} {} loads of {} in {:.2?}",
        "✓".green().bold(),
        report.loads,
        args.class.yellow(),
        report.elapsed
    );
    println!(
        "  {} loaders × {} threads × {} rounds × {} runs",
        args.loaders, args.threads, args.rounds, args.repeat
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stress_args(root: String, class: &str) -> StressArgs {
        StressArgs {
            root,
            class: class.into(),
            loaders: 3,
            threads: 2,
            rounds: 3,
            repeat: 2,
        }
    }

    fn packed_root(dir: &std::path::Path) -> String {
        let tree = dir.join("classes");
        std::fs::create_dir_all(tree.join("demo")).unwrap();
        std::fs::write(tree.join("demo/App.class"), b"\xCA\xFE\xBA\xBEapp").unwrap();
        let out = dir.join("demo.vca");
        let mut writer = ArchiveWriter::new();
        writer.add_tree(&tree).unwrap();
        writer.write_to(&out).unwrap();
        format!("jar://{}", out.to_string_lossy())
    }

    #[test]
    fn listing_names_class_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = packed_root(dir.path());
        let resolver = resolver(&RegistryConfig::default());
        let _scope = resolver.registry().scope();

        let class = resolver.resolve_file(&format!("{root}!/demo/App.class")).unwrap();
        let listing = serde_json::to_value(Listing::from(&class)).unwrap();
        assert_eq!(listing["class"], "demo.App");

        let dir_handle = resolver.resolve_file(&format!("{root}!/demo")).unwrap();
        let listing = serde_json::to_value(Listing::from(&dir_handle)).unwrap();
        assert!(listing.get("class").is_none());
    }

    #[test]
    fn expected_digest_must_match() {
        let app = ContentDigest::of(b"\xCA\xFE\xBA\xBEapp");
        let parsed = ContentDigest::from_hex(&app.to_hex()).unwrap();
        check_digest("demo.App", Some(parsed), app).unwrap();
        check_digest("demo.App", None, app).unwrap();

        let other = ContentDigest::of(b"other");
        let err = check_digest("demo.App", Some(other), app).unwrap_err();
        assert!(err.to_string().contains("digest mismatch"));
    }

    #[test]
    fn stress_succeeds_on_packed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = packed_root(dir.path());
        let report = run_stress(&RegistryConfig::default(), &stress_args(root, "demo.App")).unwrap();
        assert_eq!(report.loads, 18);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
    }

    #[test]
    fn stress_reports_missing_class() {
        let dir = tempfile::tempdir().unwrap();
        let root = packed_root(dir.path());
        let report = run_stress(&RegistryConfig::default(), &stress_args(root, "demo.Gone")).unwrap();
        assert_eq!(report.failures.len(), 18);
    }
}
