use clap::Parser;
use rand::Rng;
use std::path::{Path, PathBuf};

use boss_shuffle_core::{build_spoiler_log, run, sample_world, shuffle_bosses, ShuffleSettings};

#[derive(Debug, Parser)]
#[command(name = "boss-shuffle", version, about = "Boss shuffle and rebalance tool")]
struct Args {
    /// Catalog file (.json / .json.gz) or directory of catalog files.
    #[arg(long, required_unless_present_any = ["settings", "preview_sample"])]
    input: Option<PathBuf>,

    #[arg(long, required_unless_present_any = ["settings", "preview_sample"])]
    output: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    /// JSON settings preset. Flags given on the command line are applied on
    /// top of it.
    #[arg(long, value_name = "JSON")]
    settings: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    include_optional_boss: bool,

    #[arg(long, default_value_t = false)]
    disable_stat_scaling: bool,

    #[arg(long, default_value_t = false)]
    bundle: bool,

    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Shuffle the built-in sample catalog and print the spoiler log.
    /// Nothing is written to disk.
    #[arg(long, hide = true)]
    preview_sample: bool,
}

fn load_preset(path: &Path) -> Result<ShuffleSettings, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {:?}: {}", path, e))?;
    serde_json::from_str(&data).map_err(|e| format!("Failed to parse {:?}: {}", path, e))
}

fn build_settings(args: Args) -> Result<ShuffleSettings, String> {
    let mut settings = match &args.settings {
        Some(path) => load_preset(path)?,
        None => ShuffleSettings::default(),
    };

    if let Some(seed) = args.seed {
        settings.seed = seed;
    } else if args.settings.is_none() {
        settings.seed = rand_seed();
    }
    if let Some(input) = args.input {
        settings.input_path = input;
    }
    if let Some(output) = args.output {
        settings.output_path = output;
    }

    settings.include_optional_boss |= args.include_optional_boss;
    settings.disable_stat_scaling |= args.disable_stat_scaling;
    settings.export_bundle |= args.bundle;
    settings.debug |= args.debug;

    if settings.input_path.as_os_str().is_empty() || settings.output_path.as_os_str().is_empty() {
        return Err("input and output paths are required (flags or settings preset)".to_string());
    }

    Ok(settings)
}

fn rand_seed() -> u64 {
    rand::thread_rng().gen::<u64>()
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if args.preview_sample {
        let seed = args.seed.unwrap_or_else(rand_seed);
        let settings = ShuffleSettings {
            seed,
            include_optional_boss: args.include_optional_boss,
            disable_stat_scaling: args.disable_stat_scaling,
            ..ShuffleSettings::default()
        };
        let result = sample_world().and_then(|mut world| {
            let report = shuffle_bosses(&mut world, &settings)?;
            Ok(build_spoiler_log(seed, &world, &report))
        });
        match result {
            Ok(log) => print!("{}", log),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let settings = match build_settings(args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    log::info!("seed: {}", settings.seed);

    match run(settings) {
        Ok(out_root) => println!("Output written to {}", out_root.display()),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
