//! Fancy Image - octave-indexed sampling from the command line.
//!
//! This binary opens an image through [`FancyImage`] and either prints one
//! sample, writes a crop around a center point, or describes the octave
//! ladder.

use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fancy_image::{
    codec,
    config::{Cli, Command, CropConfig, InfoConfig, SampleConfig},
    crop_around, FancyImage,
};

/// Exit code of `crop` when the input yields no usable image.
const EXIT_NO_CHANNELS: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Sample(config) => run_sample(config),
        Command::Crop(config) => run_crop(config),
        Command::Info(config) => run_info(config),
    }
}

/// Initialize the tracing subscriber; `RUST_LOG` takes precedence.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "fancy_image=debug"
    } else {
        "fancy_image=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Sample Command
// =============================================================================

fn run_sample(config: SampleConfig) -> ExitCode {
    let image = match FancyImage::open(&config.image, &config.options) {
        Ok(image) => image,
        Err(e) => {
            error!("Cannot open {}: {}", config.image, e);
            return ExitCode::FAILURE;
        }
    };

    println!("image \"{}\"", config.image);
    println!("\tw  = {}", image.width());
    println!("\th  = {}", image.height());
    println!("\tpd = {}", image.channels());
    println!("\tno = {}", image.octave_count());

    let value = image.sample_at_octave(config.octave, config.x, config.y, config.channel);
    println!(
        "\t ({})[{},{}]{{{}}} = {}",
        config.octave, config.x, config.y, config.channel, value
    );

    close(image)
}

// =============================================================================
// Crop Command
// =============================================================================

fn run_crop(config: CropConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let image = match FancyImage::open(&config.input, &config.options) {
        Ok(image) if image.channels() > 0 => image,
        Ok(_) => {
            error!("{} has no channels", config.input);
            return ExitCode::from(EXIT_NO_CHANNELS);
        }
        Err(e) => {
            error!("Cannot open {}: {}", config.input, e);
            return ExitCode::from(EXIT_NO_CHANNELS);
        }
    };

    let channels = image.channels();
    let crop = crop_around(&image, config.octave, config.cx, config.cy, config.diameter);
    let closed = close(image);

    if let Err(e) = codec::encode(
        &config.output,
        &crop,
        config.diameter,
        config.diameter,
        channels,
    ) {
        error!("Cannot write {}: {}", config.output, e);
        return ExitCode::FAILURE;
    }

    closed
}

// =============================================================================
// Info Command
// =============================================================================

fn run_info(config: InfoConfig) -> ExitCode {
    let image = match FancyImage::open(&config.image, &config.options) {
        Ok(image) => image,
        Err(e) => {
            error!("Cannot open {}: {}", config.image, e);
            return ExitCode::FAILURE;
        }
    };

    println!("Fancy Image");
    println!("═══════════");
    println!();
    println!("  Image:    {}", config.image);
    println!("  Backend:  {}", image.backend().name());
    println!("  Size:     {} x {}", image.width(), image.height());
    println!("  Channels: {}", image.channels());
    println!("  Octaves:  {}", image.octave_count());
    println!();

    for octave in 0..image.octave_count() as isize {
        println!(
            "  [{:>2}] {} x {}",
            octave,
            image.width_at_octave(octave),
            image.height_at_octave(octave)
        );
    }

    close(image)
}

fn close(image: FancyImage) -> ExitCode {
    match image.close() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to close image: {}", e);
            ExitCode::FAILURE
        }
    }
}
