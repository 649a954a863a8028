//! Utility to export a static time-series plot for one clip.

use std::path::PathBuf;

use cliptab::config;
use cliptab::logging;
use cliptab::metadata::{ClipKey, MetadataTable};
use cliptab::pipeline::PipelineContext;
use cliptab::plot::{self, PlotError};

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

    let mut config =
        config::load_or_default(&options.config_path).map_err(|err| err.to_string())?;
    if let Some(path) = &options.metadata_path {
        config.metadata_path = path.clone();
    }
    if let Some(path) = &options.clips_root {
        config.clips_root = path.clone();
    }
    if let Some(path) = &options.out_dir {
        config.plot_dir = path.clone();
    }

    let mut metadata = MetadataTable::load(&config.metadata_path).map_err(|err| err.to_string())?;
    // Only the requested clip needs decoding.
    metadata
        .records
        .retain(|record| record.clip_key().as_ref() == Some(&options.key));

    let context = PipelineContext {
        metadata,
        clips_root: config.clips_root.clone(),
        originals_root: config.originals_root.clone(),
        data_root: config.data_root.clone(),
        worker_cap: 1,
    };
    let table = context.load_clip_table();

    match plot::save_time_series_png(&table, &config.plot_dir, &options.key) {
        Ok(path) => {
            println!("Wrote {}", path.display());
            Ok(())
        }
        Err(err @ (PlotError::ClipNotFound { .. } | PlotError::NoAudio { .. })) => {
            println!("{err}");
            Ok(())
        }
        Err(err) => Err(err.to_string()),
    }
}

struct Options {
    config_path: PathBuf,
    metadata_path: Option<PathBuf>,
    clips_root: Option<PathBuf>,
    out_dir: Option<PathBuf>,
    key: ClipKey,
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut config_path = PathBuf::from(config::CONFIG_FILE_NAME);
    let mut metadata_path = None;
    let mut clips_root = None;
    let mut out_dir = None;
    let mut show: Option<String> = None;
    let mut ep_id: Option<i64> = None;
    let mut clip_id: Option<i64> = None;

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
                config_path = PathBuf::from(value);
            }
            "--metadata" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--metadata requires a value".to_string())?;
                metadata_path = Some(PathBuf::from(value));
            }
            "--clips-root" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--clips-root requires a value".to_string())?;
                clips_root = Some(PathBuf::from(value));
            }
            "--out" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                out_dir = Some(PathBuf::from(value));
            }
            "--show" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--show requires a value".to_string())?;
                show = Some(value.to_string());
            }
            "--ep" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--ep requires a value".to_string())?;
                ep_id = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| format!("Invalid --ep value: {value}"))?,
                );
            }
            "--clip" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--clip requires a value".to_string())?;
                clip_id = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| format!("Invalid --clip value: {value}"))?,
                );
            }
            unknown => {
                return Err(format!("Unknown argument: {unknown}\n\n{}", help_text()));
            }
        }
        idx += 1;
    }

    let show = show.ok_or_else(|| "--show is required".to_string())?;
    let ep_id = ep_id.ok_or_else(|| "--ep is required".to_string())?;
    let clip_id = clip_id.ok_or_else(|| "--clip is required".to_string())?;

    Ok(Some(Options {
        config_path,
        metadata_path,
        clips_root,
        out_dir,
        key: ClipKey {
            show,
            ep_id,
            clip_id,
        },
    }))
}

fn help_text() -> String {
    [
        "cliptab-plot",
        "",
        "Decodes one clip and writes its time-series plot as a PNG named",
        "time_series_plot_<show>_<ep>_<clip>.png.",
        "",
        "Usage:",
        "  cliptab-plot --show <name> --ep <n> --clip <n> [options]",
        "",
        "Options:",
        "  --config <path>      Config file (default: cliptab.toml).",
        "  --metadata <path>    Metadata CSV (overrides config).",
        "  --clips-root <dir>   Per-clip audio root (overrides config).",
        "  --out <dir>          Output directory (overrides config plot_dir).",
    ]
    .join("\n")
}
