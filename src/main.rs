#![deny(missing_docs)]
#![deny(warnings)]

//! Entry point for the cliptab batch loader.

use std::path::PathBuf;

use cliptab::config::{self, RunConfig};
use cliptab::logging;
use cliptab::metadata::MetadataTable;
use cliptab::pipeline::PipelineContext;
use cliptab::table;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }

    let config = load_config(&options)?;
    let metadata = MetadataTable::load(&config.metadata_path).map_err(|err| err.to_string())?;
    println!(
        "Loaded {} metadata rows from {}",
        metadata.len(),
        config.metadata_path.display()
    );

    let context = PipelineContext {
        metadata,
        clips_root: config.clips_root.clone(),
        originals_root: config.originals_root.clone(),
        data_root: config.data_root.clone(),
        worker_cap: config.worker_cap,
    };

    if let Some(dir) = &options.export_dir {
        std::fs::create_dir_all(dir)
            .map_err(|err| format!("Failed to create export directory {}: {err}", dir.display()))?;
    }

    if options.stages.clips {
        let clips = context.load_clip_table();
        print_summary("Clip table", clips.len(), clips.loaded_count());
        if let Some(dir) = &options.export_dir {
            let path = dir.join("clip_table.csv");
            table::write_clip_csv(&clips, &path).map_err(|err| err.to_string())?;
            println!("Exported {}", path.display());
        }
    }
    if options.stages.episodes {
        let episodes = context.load_episode_table();
        print_summary("Episode table", episodes.len(), episodes.loaded_count());
    }
    if options.stages.augment {
        let augmented = context.augment_metadata().map_err(|err| err.to_string())?;
        print_summary("Augmented table", augmented.len(), augmented.loaded_count());
        if let Some(dir) = &options.export_dir {
            let path = dir.join("augmented_metadata.csv");
            table::write_augmented_csv(&augmented, &path).map_err(|err| err.to_string())?;
            println!("Exported {}", path.display());
        }
    }
    Ok(())
}

fn print_summary(name: &str, rows: usize, loaded: usize) {
    println!(
        "{name}: {rows} rows, {loaded} with audio, {} missing or failed",
        rows - loaded
    );
}

fn load_config(options: &Options) -> Result<RunConfig, String> {
    let mut config =
        config::load_or_default(&options.config_path).map_err(|err| err.to_string())?;
    if let Some(path) = &options.metadata_path {
        config.metadata_path = path.clone();
    }
    if let Some(path) = &options.clips_root {
        config.clips_root = path.clone();
    }
    if let Some(path) = &options.originals_root {
        config.originals_root = path.clone();
    }
    if let Some(path) = &options.data_root {
        config.data_root = path.clone();
    }
    if let Some(workers) = options.workers {
        config.worker_cap = workers;
    }
    Ok(config.normalized())
}

struct Options {
    config_path: PathBuf,
    metadata_path: Option<PathBuf>,
    clips_root: Option<PathBuf>,
    originals_root: Option<PathBuf>,
    data_root: Option<PathBuf>,
    workers: Option<usize>,
    export_dir: Option<PathBuf>,
    stages: Stages,
}

struct Stages {
    clips: bool,
    episodes: bool,
    augment: bool,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        config_path: PathBuf::from(config::CONFIG_FILE_NAME),
        metadata_path: None,
        clips_root: None,
        originals_root: None,
        data_root: None,
        workers: None,
        export_dir: None,
        stages: Stages {
            clips: false,
            episodes: false,
            augment: false,
        },
    };

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--config requires a value".to_string())?;
                options.config_path = PathBuf::from(value);
            }
            "--metadata" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--metadata requires a value".to_string())?;
                options.metadata_path = Some(PathBuf::from(value));
            }
            "--clips-root" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--clips-root requires a value".to_string())?;
                options.clips_root = Some(PathBuf::from(value));
            }
            "--originals-root" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--originals-root requires a value".to_string())?;
                options.originals_root = Some(PathBuf::from(value));
            }
            "--data-root" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--data-root requires a value".to_string())?;
                options.data_root = Some(PathBuf::from(value));
            }
            "--workers" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--workers requires a value".to_string())?;
                options.workers = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("Invalid --workers value: {value}"))?,
                );
            }
            "--export-dir" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--export-dir requires a value".to_string())?;
                options.export_dir = Some(PathBuf::from(value));
            }
            "--clips" => options.stages.clips = true,
            "--episodes" => options.stages.episodes = true,
            "--augment" => options.stages.augment = true,
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    // Without explicit stage flags, run the two fresh-table stages.
    if !options.stages.clips && !options.stages.episodes && !options.stages.augment {
        options.stages.clips = true;
        options.stages.episodes = true;
    }

    Ok(Some(options))
}

fn help_text() -> String {
    [
        "cliptab",
        "",
        "Loads a labeled audio-clip dataset into in-memory tables joining",
        "metadata rows with decoded waveforms.",
        "",
        "Usage:",
        "  cliptab [--config <path>] [options] [stages]",
        "",
        "Options:",
        "  --config <path>           Config file (default: cliptab.toml).",
        "  --metadata <path>         Metadata CSV (overrides config).",
        "  --clips-root <dir>        Per-clip audio root (overrides config).",
        "  --originals-root <dir>    Per-episode audio root (overrides config).",
        "  --data-root <dir>         Tree-indexed audio root (overrides config).",
        "  --workers <n>             Concurrent decode workers (default: 100).",
        "  --export-dir <dir>        Also write the built tables as CSV here.",
        "",
        "Stages (default: --clips --episodes):",
        "  --clips                   Build the fresh clip-level table.",
        "  --episodes                Build the per-episode table.",
        "  --augment                 Augment the metadata table in place.",
    ]
    .join("\n")
}
