use clap::Parser;
use eyre::Result;

mod cases;
mod config;
mod driver;
mod record;
mod sysinfo;

use config::{BenchConfig, Cli};

fn main() -> Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let cli = Cli::parse();
	let config = BenchConfig::load(&cli)?;
	log::debug!("{config:?}");

	if cli.verbose {
		println!("{}", sysinfo::SystemInfo::snapshot());
	}

	let mut cases = cases::build(&config);
	let record = driver::run(&config, &mut cases);

	record.write_json(&config.output)?;
	log::info!("results written to `{}`", config.output.display());
	if let Some(path) = &config.csv {
		record.write_csv(path)?;
		log::info!("summary written to `{}`", path.display());
	}

	print!("{}", record.table());
	if !record.failures.is_empty() {
		println!("{} failed case(s)", record.failures.len());
	}

	Ok(())
}
