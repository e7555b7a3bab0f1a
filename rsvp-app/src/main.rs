mod app;
mod cli;
mod headless;
mod logging;
mod records;
mod steps;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use log::info;
use records::RecordSink;
use rsvp_experiment::{SessionConfig, random_subject_id, seed_from_id};
use rsvp_render::load_font;

fn main() -> Result<()> {
    logging::init_logger();
    let args = cli::Args::parse();

    let config = SessionConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let media_root = args
        .config
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    let subject_id = random_subject_id(config.subject_id_length, &mut rand::rng());
    let seed = args
        .seed
        .or(config.seed)
        .unwrap_or_else(|| seed_from_id(&subject_id));
    info!("subject {subject_id}, seed {seed}");
    let mut sink = RecordSink::stdout(&subject_id);

    if let Some(mode) = args.simulate {
        headless::run(&config, &media_root, mode.into(), seed, &mut sink)?;
        return Ok(());
    }

    let font = args.font.as_deref().map(load_font).transpose()?;
    let app = App::new(config, &media_root, font, seed, sink, args.windowed)?;
    app.run()
}
