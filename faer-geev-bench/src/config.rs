use clap::{Parser, ValueEnum};
use eyre::{Result, WrapErr};
use faer_geev::DType;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// configuration file read when `--config` is not given, if it exists
pub const DEFAULT_CONFIG: &str = "bench.toml";

/// benchmarked implementation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
	/// faer's high-level eigendecomposition, called directly
	Faer,
	/// `geev` dispatch on the faer backend
	FaerGeev,
	/// `geev` dispatch on MAGMA
	Magma,
}

impl BackendKind {
	pub const ALL: [BackendKind; 3] = [BackendKind::Faer, BackendKind::FaerGeev, BackendKind::Magma];

	pub fn name(self) -> &'static str {
		match self {
			BackendKind::Faer => "faer",
			BackendKind::FaerGeev => "faer-geev",
			BackendKind::Magma => "magma",
		}
	}
}

fn dtype_tag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DType, D::Error> {
	let tag = String::deserialize(deserializer)?;
	DType::from_tag(&tag).map_err(serde::de::Error::custom)
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
	pub sizes: Vec<usize>,
	#[serde(deserialize_with = "dtype_tag")]
	pub dtype: DType,
	pub backends: Vec<BackendKind>,
	pub seed: u64,
	/// `1` is sequential, `0` uses every core
	pub threads: usize,
	pub warmup: bool,
	pub system_info: bool,
	pub output: PathBuf,
	pub csv: Option<PathBuf>,
	pub magma_library: Option<PathBuf>,
}

impl Default for BenchConfig {
	fn default() -> Self {
		Self {
			sizes: vec![250, 500, 1000, 2000, 4000, 8000],
			dtype: DType::F64,
			backends: BackendKind::ALL.to_vec(),
			seed: 1234,
			threads: 1,
			warmup: true,
			system_info: true,
			output: PathBuf::from("benchmark.json"),
			csv: None,
			magma_library: None,
		}
	}
}

/// times the dense non-symmetric eigensolver across backends and problem sizes
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
	/// configuration file, `bench.toml` is used when present
	#[arg(long)]
	pub config: Option<PathBuf>,
	/// problem sizes, in order
	#[arg(long, value_delimiter = ',')]
	pub sizes: Option<Vec<usize>>,
	/// element type: s, d, c, z (or f32, f64, c32, c64)
	#[arg(long)]
	pub dtype: Option<DType>,
	/// backends, in order
	#[arg(long, value_enum, value_delimiter = ',')]
	pub backends: Option<Vec<BackendKind>>,
	#[arg(long)]
	pub seed: Option<u64>,
	/// cpu threads, 0 uses every core
	#[arg(long)]
	pub threads: Option<usize>,
	/// skip the untimed 3x3 solve before each backend
	#[arg(long)]
	pub no_warmup: bool,
	/// do not record a system snapshot with each measurement
	#[arg(long)]
	pub no_system_info: bool,
	/// json artifact path
	#[arg(long)]
	pub output: Option<PathBuf>,
	/// csv summary path
	#[arg(long)]
	pub csv: Option<PathBuf>,
	/// path to libmagma, searched by name otherwise
	#[arg(long)]
	pub magma_library: Option<PathBuf>,
	/// print the system snapshot before running
	#[arg(long, short)]
	pub verbose: bool,
}

impl BenchConfig {
	pub fn from_toml(text: &str) -> Result<Self> {
		toml::from_str(text).wrap_err("invalid benchmark configuration")
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read `{}`", path.display()))?;
		Self::from_toml(&text).wrap_err_with(|| format!("in `{}`", path.display()))
	}

	/// reads the configuration file named by `cli`, or `bench.toml` if present, then applies the
	/// command line overrides
	pub fn load(cli: &Cli) -> Result<Self> {
		let base = match &cli.config {
			Some(path) => Self::from_file(path)?,
			None if Path::new(DEFAULT_CONFIG).exists() => Self::from_file(Path::new(DEFAULT_CONFIG))?,
			None => Self::default(),
		};
		Ok(base.with_overrides(cli))
	}

	pub fn with_overrides(mut self, cli: &Cli) -> Self {
		if let Some(sizes) = &cli.sizes {
			self.sizes = sizes.clone();
		}
		if let Some(dtype) = cli.dtype {
			self.dtype = dtype;
		}
		if let Some(backends) = &cli.backends {
			self.backends = backends.clone();
		}
		if let Some(seed) = cli.seed {
			self.seed = seed;
		}
		if let Some(threads) = cli.threads {
			self.threads = threads;
		}
		if cli.no_warmup {
			self.warmup = false;
		}
		if cli.no_system_info {
			self.system_info = false;
		}
		if let Some(output) = &cli.output {
			self.output = output.clone();
		}
		if let Some(csv) = &cli.csv {
			self.csv = Some(csv.clone());
		}
		if let Some(path) = &cli.magma_library {
			self.magma_library = Some(path.clone());
		}
		self
	}
}
