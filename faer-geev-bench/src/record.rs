use crate::sysinfo::SystemInfo;
use eyre::{Result, WrapErr};
use faer_geev::{DType, Error};
use human_repr::HumanDuration;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
	/// position of the size in the configured list
	pub index: usize,
	pub n: usize,
	/// seconds
	pub elapsed: f64,
	pub system: Option<SystemInfo>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseFailure {
	pub backend: String,
	pub n: usize,
	pub kind: String,
	pub message: String,
}

impl CaseFailure {
	pub fn new(backend: &str, n: usize, err: &Error) -> Self {
		Self {
			backend: backend.to_owned(),
			n,
			kind: err.kind().to_owned(),
			message: err.to_string(),
		}
	}
}

/// results of one benchmark run, appended to as cases complete
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
	pub dtype: DType,
	pub sizes: Vec<usize>,
	/// backends that were run, in order
	pub backends: Vec<String>,
	pub timings: BTreeMap<String, Vec<Measurement>>,
	pub failures: Vec<CaseFailure>,
}

impl BenchmarkRecord {
	pub fn new(dtype: DType, sizes: Vec<usize>) -> Self {
		Self {
			dtype,
			sizes,
			backends: Vec::new(),
			timings: BTreeMap::new(),
			failures: Vec::new(),
		}
	}

	pub fn add_backend(&mut self, backend: &str) {
		if !self.backends.iter().any(|b| b == backend) {
			self.backends.push(backend.to_owned());
		}
		self.timings.entry(backend.to_owned()).or_default();
	}

	pub fn push(&mut self, backend: &str, measurement: Measurement) {
		self.add_backend(backend);
		if let Some(timings) = self.timings.get_mut(backend) {
			timings.push(measurement);
		}
	}

	pub fn fail(&mut self, failure: CaseFailure) {
		self.failures.push(failure);
	}

	/// elapsed seconds of `backend` at the `index`-th configured size, if that case succeeded
	pub fn elapsed(&self, backend: &str, index: usize) -> Option<f64> {
		self.timings.get(backend)?.iter().find(|m| m.index == index).map(|m| m.elapsed)
	}

	pub fn write_json(&self, path: &Path) -> Result<()> {
		let file = File::create(path).wrap_err_with(|| format!("failed to create `{}`", path.display()))?;
		let mut writer = BufWriter::new(file);
		serde_json::to_writer_pretty(&mut writer, self)?;
		writer.flush()?;
		Ok(())
	}

	/// one row per size, one column per backend, elapsed seconds. failed cases are left empty.
	pub fn write_csv(&self, path: &Path) -> Result<()> {
		let mut writer =
			csv::Writer::from_path(path).wrap_err_with(|| format!("failed to create `{}`", path.display()))?;

		let mut header = vec!["n".to_owned()];
		header.extend(self.backends.iter().cloned());
		writer.write_record(&header)?;

		for (index, &n) in self.sizes.iter().enumerate() {
			let mut row = vec![n.to_string()];
			for backend in &self.backends {
				row.push(self.elapsed(backend, index).map(|t| t.to_string()).unwrap_or_default());
			}
			writer.write_record(&row)?;
		}
		writer.flush()?;
		Ok(())
	}

	/// human-readable summary table
	pub fn table(&self) -> String {
		let fmt = |t: Option<f64>| match t {
			Some(t) => format!("{}", Duration::from_secs_f64(t).human_duration()),
			None => "failed".to_owned(),
		};

		let mut out = format!("eig ({})\n{:>6}", self.dtype, "");
		for backend in &self.backends {
			out += &format!(" {backend:>15}");
		}
		out.push('\n');

		for (index, &n) in self.sizes.iter().enumerate() {
			out += &format!("{n:>6}");
			for backend in &self.backends {
				out += &format!(" {:>15}", fmt(self.elapsed(backend, index)));
			}
			out.push('\n');
		}
		out
	}
}
