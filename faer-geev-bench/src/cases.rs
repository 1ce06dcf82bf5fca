use crate::config::{BackendKind, BenchConfig};
use faer::complex_native::{c32, c64};
use faer::Mat;
use faer_geev::backend::faer::parallelism;
use faer_geev::{DynMatrix, Error, FaerBackend, GeevBackend, MagmaBackend, Matrix, Session};
use std::time::{Duration, Instant};

/// one benchmarked implementation
pub trait BenchCase {
	fn name(&self) -> &str;

	/// acquires whatever state the implementation needs for a sequence of solves
	fn open(&mut self) -> Result<Box<dyn CaseScope + '_>, Error>;
}

pub trait CaseScope {
	/// solves the eigenproblem of `a`, returning the time spent in the solver only
	fn solve(&mut self, a: DynMatrix) -> Result<Duration, Error>;
}

/// faer's high-level `Mat::eigendecomposition`, bypassing the `geev` dispatch
pub struct DirectFaer {
	threads: usize,
}

impl DirectFaer {
	pub fn new(threads: usize) -> Self {
		Self { threads }
	}
}

struct DirectFaerScope;

impl BenchCase for DirectFaer {
	fn name(&self) -> &str {
		BackendKind::Faer.name()
	}

	fn open(&mut self) -> Result<Box<dyn CaseScope + '_>, Error> {
		faer::set_global_parallelism(parallelism(self.threads));
		Ok(Box::new(DirectFaerScope))
	}
}

fn to_mat<T: Copy, E: faer::Entity>(a: &Matrix<T>, f: impl Fn(T) -> E) -> Mat<E> {
	Mat::from_fn(a.nrows(), a.ncols(), |i, j| f(a.read(i, j)))
}

fn timed<R>(f: impl FnOnce() -> R) -> Duration {
	let start = Instant::now();
	core::hint::black_box(f());
	start.elapsed()
}

impl CaseScope for DirectFaerScope {
	fn solve(&mut self, a: DynMatrix) -> Result<Duration, Error> {
		let (nrows, ncols) = a.shape();
		if nrows != ncols {
			return Err(Error::ShapeError { nrows, ncols });
		}
		if nrows == 0 {
			return Err(Error::InvalidDimension {
				nrows,
				ncols,
				len: None,
			});
		}

		Ok(match a {
			DynMatrix::F32(a) => {
				let a = to_mat(&a, |x| x);
				timed(|| a.eigendecomposition::<c32>())
			}
			DynMatrix::F64(a) => {
				let a = to_mat(&a, |x| x);
				timed(|| a.eigendecomposition::<c64>())
			}
			DynMatrix::C32(a) => {
				let a = to_mat(&a, |z| c32 { re: z.re, im: z.im });
				timed(|| a.eigendecomposition::<c32>())
			}
			DynMatrix::C64(a) => {
				let a = to_mat(&a, |z| c64 { re: z.re, im: z.im });
				timed(|| a.eigendecomposition::<c64>())
			}
		})
	}
}

/// the `geev` dispatch on a backend, one session per scope
pub struct CoreCase<B> {
	name: String,
	backend: B,
}

impl<B: GeevBackend> CoreCase<B> {
	pub fn new(name: impl Into<String>, backend: B) -> Self {
		Self {
			name: name.into(),
			backend,
		}
	}
}

struct CoreScope<'a, B: GeevBackend>(Session<'a, B>);

impl<B: GeevBackend> BenchCase for CoreCase<B> {
	fn name(&self) -> &str {
		&self.name
	}

	fn open(&mut self) -> Result<Box<dyn CaseScope + '_>, Error> {
		Ok(Box::new(CoreScope(Session::open(&mut self.backend)?)))
	}
}

impl<B: GeevBackend> CaseScope for CoreScope<'_, B> {
	fn solve(&mut self, a: DynMatrix) -> Result<Duration, Error> {
		let start = Instant::now();
		let eig = self.0.eig_dyn(a)?;
		let elapsed = start.elapsed();
		drop(core::hint::black_box(eig));
		Ok(elapsed)
	}
}

/// builds the configured cases in order. an unavailable MAGMA library is logged and skipped.
pub fn build(config: &BenchConfig) -> Vec<Box<dyn BenchCase>> {
	let mut cases: Vec<Box<dyn BenchCase>> = Vec::with_capacity(config.backends.len());
	for &kind in &config.backends {
		match kind {
			BackendKind::Faer => cases.push(Box::new(DirectFaer::new(config.threads))),
			BackendKind::FaerGeev => cases.push(Box::new(CoreCase::new(
				kind.name(),
				FaerBackend::with_threads(config.threads),
			))),
			BackendKind::Magma => match MagmaBackend::load(config.magma_library.as_deref()) {
				Ok(backend) => {
					log::info!("magma: using `{}`", backend.path());
					cases.push(Box::new(CoreCase::new(kind.name(), backend)));
				}
				Err(err) => log::warn!("magma: skipped, {err}"),
			},
		}
	}
	cases
}
