use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use wavplay::config;
use wavplay::logging;
use wavplay::sound::playback::{list_output_devices, AudioContext, CpalDevice};
use wavplay::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration file, then let the command line override it
    let options = config::load_config(cli.config.as_deref())?;
    let options = cli.merge_into_options(options)?;

    logging::init(options.log_level);
    log::debug!("options: {:?}", options);

    if cli.list_devices {
        let devices = list_output_devices().context("Failed to enumerate output devices")?;
        for name in devices {
            println!("{}", name);
        }
        return Ok(());
    }

    if cli.files.is_empty() {
        anyhow::bail!("No input files given. Try --help.");
    }

    let device = CpalDevice::with_device(options.device.clone());
    let mut ctx = AudioContext::new(Box::new(device), options.decode_options());

    let mut failures = 0;
    for path in &cli.files {
        let result = if cli.info {
            print_info(&ctx, path)
        } else {
            play(&mut ctx, path)
        };
        if let Err(err) = result {
            log::error!("{:#}", err);
            failures += 1;
        }
    }

    ctx.terminate_all();

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, cli.files.len());
    }
    Ok(())
}

fn print_info(ctx: &AudioContext, path: &Path) -> Result<()> {
    let sound = ctx
        .decode_file(path)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let format = sound.format();
    println!(
        "{}: {}, {} channel(s), {} Hz, {} frames ({:.3} s)",
        path.display(),
        format.codec.name(),
        format.channels,
        format.sample_rate,
        sound.frame_count(),
        sound.duration().as_secs_f64()
    );
    Ok(())
}

fn play(ctx: &mut AudioContext, path: &Path) -> Result<()> {
    let id = ctx
        .play_file(path)
        .with_context(|| format!("Failed to play {}", path.display()))?;
    let finished = ctx.completion(id)?.wait();
    if !finished {
        log::warn!("{}: playback stopped early", path.display());
    }
    ctx.reap_finished();
    Ok(())
}
