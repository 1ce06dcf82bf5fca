use crate::cases::BenchCase;
use crate::config::BenchConfig;
use crate::record::{BenchmarkRecord, CaseFailure, Measurement};
use crate::sysinfo::SystemInfo;
use faer_geev::{DType, DynMatrix};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// square matrix with entries uniform in `[0, 1)`. complex entries have independent real and
/// imaginary parts.
pub fn random_matrix(dtype: DType, n: usize, rng: &mut impl Rng) -> DynMatrix {
	let complex = dtype.is_complex();
	DynMatrix::from_fn(dtype, n, n, |_, _| {
		let re = rng.gen::<f64>();
		let im = if complex { rng.gen::<f64>() } else { 0.0 };
		Complex64::new(re, im)
	})
}

/// seeds the generator of the size-`n` input, so that every backend solves the same matrices
fn rng_for(seed: u64, n: usize) -> StdRng {
	StdRng::seed_from_u64(seed.wrapping_add(n as u64))
}

/// runs every case over every configured size.
///
/// backends form the outer loop and sizes the inner loop, both in configured order. a failing
/// case is logged and recorded, and the run moves on.
pub fn run(config: &BenchConfig, cases: &mut [Box<dyn BenchCase>]) -> BenchmarkRecord {
	let mut record = BenchmarkRecord::new(config.dtype, config.sizes.clone());

	for case in cases.iter_mut() {
		let name = case.name().to_owned();
		record.add_backend(&name);

		let mut scope = match case.open() {
			Ok(scope) => scope,
			Err(err) => {
				log::error!("{name}: failed to open: {err}");
				for &n in &config.sizes {
					record.fail(CaseFailure::new(&name, n, &err));
				}
				continue;
			}
		};

		if config.warmup {
			if let Err(err) = scope.solve(random_matrix(config.dtype, 3, &mut rng_for(config.seed, 3))) {
				log::warn!("{name}: warmup failed: {err}");
			}
		}

		for (index, &n) in config.sizes.iter().enumerate() {
			let a = random_matrix(config.dtype, n, &mut rng_for(config.seed, n));
			log::info!("{name}: n = {n}");

			match scope.solve(a) {
				Ok(elapsed) => {
					log::debug!("{name}: n = {n} took {elapsed:?}");
					record.push(
						&name,
						Measurement {
							index,
							n,
							elapsed: elapsed.as_secs_f64(),
							system: config.system_info.then(SystemInfo::snapshot),
						},
					);
				}
				Err(err) => {
					log::error!("{name}: n = {n} failed with {}: {err}", err.kind());
					record.fail(CaseFailure::new(&name, n, &err));
				}
			}
		}
	}

	record
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cases::{self, CoreCase};
	use crate::config::BackendKind;
	use faer_geev::{Error, FaerBackend, GeevBackend, GeevBuffers, Job};
	use num_complex::Complex32;
	use std::path::PathBuf;

	/// faer backend that reports a solver failure for one problem size
	struct FailAt {
		inner: FaerBackend,
		n: usize,
		status: i32,
	}

	impl FailAt {
		fn check(&self, n: usize) -> Option<Result<i32, Error>> {
			(n == self.n).then_some(Ok(self.status))
		}
	}

	impl GeevBackend for FailAt {
		fn name(&self) -> &str {
			"fail-at"
		}

		fn init(&mut self) -> Result<(), Error> {
			self.inner.init()
		}

		fn finalize(&mut self) {
			self.inner.finalize()
		}

		fn is_initialized(&self) -> bool {
			self.inner.is_initialized()
		}

		fn geqrf_nb(&self, dtype: DType, m: usize, n: usize) -> Result<usize, Error> {
			self.inner.geqrf_nb(dtype, m, n)
		}

		fn sgeev(&mut self, l: Job, r: Job, b: &mut GeevBuffers<f32>) -> Result<i32, Error> {
			self.check(b.n).unwrap_or_else(|| self.inner.sgeev(l, r, b))
		}

		fn dgeev(&mut self, l: Job, r: Job, b: &mut GeevBuffers<f64>) -> Result<i32, Error> {
			self.check(b.n).unwrap_or_else(|| self.inner.dgeev(l, r, b))
		}

		fn cgeev(&mut self, l: Job, r: Job, b: &mut GeevBuffers<Complex32>) -> Result<i32, Error> {
			self.check(b.n).unwrap_or_else(|| self.inner.cgeev(l, r, b))
		}

		fn zgeev(&mut self, l: Job, r: Job, b: &mut GeevBuffers<Complex64>) -> Result<i32, Error> {
			self.check(b.n).unwrap_or_else(|| self.inner.zgeev(l, r, b))
		}
	}

	fn small_config() -> BenchConfig {
		BenchConfig {
			sizes: vec![4, 8, 16, 32],
			system_info: false,
			magma_library: Some(PathBuf::from("/nonexistent/libmagma.so")),
			..Default::default()
		}
	}

	#[test]
	fn test_random_matrix() {
		let mut rng = StdRng::seed_from_u64(1234);
		match random_matrix(DType::C64, 5, &mut rng) {
			DynMatrix::C64(a) => {
				assert!(a.as_slice().iter().all(|z| (0.0..1.0).contains(&z.re) && (0.0..1.0).contains(&z.im)));
				assert!(a.as_slice().iter().any(|z| z.im != 0.0));
			}
			_ => unreachable!(),
		}
		match random_matrix(DType::F32, 5, &mut rng) {
			DynMatrix::F32(a) => assert!(a.as_slice().iter().all(|x| (0.0..1.0).contains(x))),
			_ => unreachable!(),
		}

		let a = random_matrix(DType::F64, 6, &mut StdRng::seed_from_u64(1));
		let b = random_matrix(DType::F64, 6, &mut StdRng::seed_from_u64(1));
		assert_eq!(a, b);
	}

	#[test]
	fn test_magma_absent() {
		let config = small_config();
		let mut cases = cases::build(&config);
		let record = run(&config, &mut cases);

		assert_eq!(record.backends, ["faer", "faer-geev"]);
		assert!(!record.timings.contains_key(BackendKind::Magma.name()));
		assert!(record.failures.is_empty());
		for name in ["faer", "faer-geev"] {
			let sizes: Vec<usize> = record.timings[name].iter().map(|m| m.n).collect();
			assert_eq!(sizes, config.sizes);
		}

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("benchmark.json");
		record.write_json(&path).unwrap();
		let text = std::fs::read_to_string(&path).unwrap();
		let value: serde_json::Value = serde_json::from_str(&text).unwrap();
		assert!(value["timings"].get("magma").is_none());
		assert_eq!(value["backends"], serde_json::json!(["faer", "faer-geev"]));
		assert!(!text.contains("magma"));
	}

	#[test]
	fn test_zero_size() {
		let config = BenchConfig {
			sizes: vec![0, 4],
			backends: vec![BackendKind::FaerGeev, BackendKind::Faer],
			..small_config()
		};
		let mut cases = cases::build(&config);
		let record = run(&config, &mut cases);

		for name in ["faer", "faer-geev"] {
			let sizes: Vec<usize> = record.timings[name].iter().map(|m| m.n).collect();
			assert_eq!(sizes, [4]);
		}
		let failures: Vec<(&str, usize, &str)> = record
			.failures
			.iter()
			.map(|f| (f.backend.as_str(), f.n, f.kind.as_str()))
			.collect();
		assert_eq!(
			failures,
			[("faer-geev", 0, "InvalidDimension"), ("faer", 0, "InvalidDimension")]
		);
	}

	#[test]
	fn test_partial_failure() {
		let config = BenchConfig {
			dtype: DType::C32,
			..small_config()
		};
		let mut cases: Vec<Box<dyn BenchCase>> = vec![
			Box::new(CoreCase::new(
				"faulty",
				FailAt {
					inner: FaerBackend::default(),
					n: 16,
					status: 3,
				},
			)),
			Box::new(CoreCase::new("faer-geev", FaerBackend::default())),
		];
		let record = run(&config, &mut cases);

		let faulty: Vec<usize> = record.timings["faulty"].iter().map(|m| m.n).collect();
		assert_eq!(faulty, [4, 8, 32]);
		let healthy: Vec<usize> = record.timings["faer-geev"].iter().map(|m| m.n).collect();
		assert_eq!(healthy, [4, 8, 16, 32]);

		assert_eq!(record.failures.len(), 1);
		assert_eq!(record.failures[0].backend, "faulty");
		assert_eq!(record.failures[0].n, 16);
		assert_eq!(record.failures[0].kind, "SolverFailed");
		assert!(record.failures[0].message.contains("status 3"));
	}

	#[test]
	fn test_open_failure() {
		struct Broken;

		impl BenchCase for Broken {
			fn name(&self) -> &str {
				"broken"
			}

			fn open(&mut self) -> Result<Box<dyn cases::CaseScope + '_>, Error> {
				Err(Error::BackendNotReady)
			}
		}

		let config = small_config();
		let mut cases: Vec<Box<dyn BenchCase>> =
			vec![Box::new(Broken), Box::new(CoreCase::new("faer-geev", FaerBackend::default()))];
		let record = run(&config, &mut cases);

		assert_eq!(record.failures.len(), config.sizes.len());
		assert!(record.failures.iter().all(|f| f.backend == "broken" && f.kind == "BackendNotReady"));
		assert!(record.timings.get("broken").map_or(true, Vec::is_empty));
		assert_eq!(record.timings["faer-geev"].len(), config.sizes.len());
	}
}
