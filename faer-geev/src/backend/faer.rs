use super::{GeevBackend, GeevBuffers, Job};
use crate::{DType, Error};
use faer::complex_native::{c32, c64};
use faer::dyn_stack::{GlobalPodBuffer, PodStack};
use faer::linalg::evd::{self, ComputeVectors};
use faer::linalg::qr::no_pivoting::compute::recommended_blocksize;
use faer::{Mat, Parallelism};
use num_complex::{Complex32, Complex64};

/// cpu backend built on faer's non-symmetric eigendecomposition.
///
/// faer has no process-wide state, `init` and `finalize` only toggle the readiness flag.
#[derive(Debug)]
pub struct FaerBackend {
	parallelism: Parallelism<'static>,
	ready: bool,
}

impl Default for FaerBackend {
	fn default() -> Self {
		Self::new(Parallelism::None)
	}
}

impl FaerBackend {
	#[inline]
	pub fn new(parallelism: Parallelism<'static>) -> Self {
		Self {
			parallelism,
			ready: false,
		}
	}

	/// `1` runs sequentially, `0` uses the whole rayon thread pool
	#[inline]
	pub fn with_threads(threads: usize) -> Self {
		Self::new(parallelism(threads))
	}

	#[inline]
	pub fn parallelism(&self) -> Parallelism<'static> {
		self.parallelism
	}

	fn check_ready(&self) -> Result<(), Error> {
		if self.ready {
			Ok(())
		} else {
			Err(Error::BackendNotReady)
		}
	}
}

/// maps a thread count to faer's parallelism setting. `1` is sequential, `0` means all cores.
pub fn parallelism(threads: usize) -> Parallelism<'static> {
	match threads {
		1 => Parallelism::None,
		n => Parallelism::Rayon(n),
	}
}

fn compute_vectors(job: Job) -> ComputeVectors {
	match job {
		Job::NoVectors => ComputeVectors::No,
		Job::Vectors => ComputeVectors::Yes,
	}
}

/// `0` if every eigenvalue is finite, otherwise the 1-based index of the first one that isn't
fn status(mut finite: impl Iterator<Item = bool>) -> i32 {
	match finite.position(|ok| !ok) {
		None => 0,
		Some(i) => i32::try_from(i + 1).unwrap_or(i32::MAX),
	}
}

macro_rules! real_geev {
	($name: ident, $ty: ty, $cplx: ty) => {
		fn $name(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<$ty>) -> Result<i32, Error> {
			self.check_ready()?;
			buffers.check()?;
			// left eigenvectors are not available, reported as an illegal first argument
			if jobvl == Job::Vectors {
				return Ok(-1);
			}

			let n = buffers.n;
			let req = evd::compute_evd_req::<$cplx>(n, compute_vectors(jobvr), self.parallelism, Default::default())
				.map_err(|_| Error::invalid_dimension(n, n))?;
			let mut mem = GlobalPodBuffer::new(req);

			let a = faer::mat::from_column_major_slice::<$ty, _, _>(buffers.a.as_slice(), n, n);
			let u = match jobvr {
				Job::Vectors => Some(faer::mat::from_column_major_slice_mut(buffers.vr.as_mut_slice(), n, n)),
				Job::NoVectors => None,
			};

			evd::compute_evd_real::<$ty>(
				a,
				faer::col::from_slice_mut(buffers.w.as_mut_slice()),
				faer::col::from_slice_mut(buffers.wi.as_mut_slice()),
				u,
				self.parallelism,
				PodStack::new(&mut mem),
				Default::default(),
			);

			Ok(status(buffers.w.iter().zip(&buffers.wi).map(|(re, im)| re.is_finite() && im.is_finite())))
		}
	};
}

macro_rules! cplx_geev {
	($name: ident, $ty: ty, $faer: ident) => {
		fn $name(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<$ty>) -> Result<i32, Error> {
			self.check_ready()?;
			buffers.check()?;
			if jobvl == Job::Vectors {
				return Ok(-1);
			}

			let n = buffers.n;
			let req = evd::compute_evd_req::<$faer>(n, compute_vectors(jobvr), self.parallelism, Default::default())
				.map_err(|_| Error::invalid_dimension(n, n))?;
			let mut mem = GlobalPodBuffer::new(req);

			let a = Mat::from_fn(n, n, |i, j| {
				let z = buffers.a[i + j * n];
				$faer { re: z.re, im: z.im }
			});
			let mut s = faer::col::Col::<$faer>::zeros(n);
			let mut u = Mat::<$faer>::zeros(if jobvr == Job::Vectors { n } else { 0 }, n);

			evd::compute_evd_complex::<$faer>(
				a.as_ref(),
				s.as_mut(),
				match jobvr {
					Job::Vectors => Some(u.as_mut()),
					Job::NoVectors => None,
				},
				self.parallelism,
				PodStack::new(&mut mem),
				Default::default(),
			);

			for (i, w) in buffers.w.iter_mut().enumerate() {
				let z = s.read(i);
				*w = <$ty>::new(z.re, z.im);
			}
			if jobvr == Job::Vectors {
				for j in 0..n {
					for i in 0..n {
						let z = u.read(i, j);
						buffers.vr[i + j * n] = <$ty>::new(z.re, z.im);
					}
				}
			}

			Ok(status(buffers.w.iter().map(|z| z.re.is_finite() && z.im.is_finite())))
		}
	};
}

impl GeevBackend for FaerBackend {
	#[inline]
	fn name(&self) -> &str {
		"faer"
	}

	fn init(&mut self) -> Result<(), Error> {
		log::debug!("faer: ready with {:?}", self.parallelism);
		self.ready = true;
		Ok(())
	}

	fn finalize(&mut self) {
		self.ready = false;
	}

	#[inline]
	fn is_initialized(&self) -> bool {
		self.ready
	}

	fn geqrf_nb(&self, dtype: DType, m: usize, n: usize) -> Result<usize, Error> {
		self.check_ready()?;
		Ok(match dtype {
			DType::F32 => recommended_blocksize::<f32>(m, n),
			DType::F64 => recommended_blocksize::<f64>(m, n),
			DType::C32 => recommended_blocksize::<c32>(m, n),
			DType::C64 => recommended_blocksize::<c64>(m, n),
		})
	}

	real_geev!(sgeev, f32, c32);
	real_geev!(dgeev, f64, c64);
	cplx_geev!(cgeev, Complex32, c32);
	cplx_geev!(zgeev, Complex64, c64);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::workspace::plan;
	use assert_approx_eq::assert_approx_eq;

	fn buffers<T: crate::Element>(backend: &FaerBackend, a: Vec<T>, n: usize) -> GeevBuffers<T> {
		let ws = plan(backend, T::DTYPE, n).unwrap();
		GeevBuffers::new(a, &ws)
	}

	#[test]
	fn test_not_ready() {
		let mut backend = FaerBackend::default();
		assert_eq!(backend.geqrf_nb(DType::F64, 4, 4), Err(Error::BackendNotReady));

		backend.init().unwrap();
		let mut buf = buffers::<f64>(&backend, vec![1.0], 1);
		backend.finalize();
		assert_eq!(
			backend.dgeev(Job::NoVectors, Job::Vectors, &mut buf),
			Err(Error::BackendNotReady)
		);
	}

	#[test]
	fn test_parallelism() {
		assert_eq!(parallelism(1), Parallelism::None);
		assert_eq!(parallelism(0), Parallelism::Rayon(0));
		assert_eq!(parallelism(4), Parallelism::Rayon(4));
		assert_eq!(FaerBackend::with_threads(8).parallelism(), Parallelism::Rayon(8));
	}

	#[test]
	fn test_status() {
		assert_eq!(status([true, true].into_iter()), 0);
		assert_eq!(status([true, false, false].into_iter()), 2);
		assert_eq!(status(core::iter::empty()), 0);
	}

	#[test]
	fn test_dgeev_rotation() {
		let mut backend = FaerBackend::default();
		backend.init().unwrap();

		// rotation by 90 degrees, eigenvalues +-i
		let mut buf = buffers::<f64>(&backend, vec![0.0, 1.0, -1.0, 0.0], 2);
		assert_eq!(backend.dgeev(Job::NoVectors, Job::Vectors, &mut buf), Ok(0));

		let mut im = buf.wi.clone();
		im.sort_by(f64::total_cmp);
		assert_approx_eq!(buf.w[0], 0.0, 1e-12);
		assert_approx_eq!(buf.w[1], 0.0, 1e-12);
		assert_approx_eq!(im[0], -1.0, 1e-12);
		assert_approx_eq!(im[1], 1.0, 1e-12);
	}

	#[test]
	fn test_zgeev_diagonal() {
		let mut backend = FaerBackend::with_threads(0);
		backend.init().unwrap();

		let n = 3;
		let mut a = vec![Complex64::new(0.0, 0.0); n * n];
		a[0] = Complex64::new(1.0, 1.0);
		a[4] = Complex64::new(2.0, 0.0);
		a[8] = Complex64::new(0.0, -3.0);
		let mut buf = buffers(&backend, a, n);
		assert_eq!(backend.zgeev(Job::NoVectors, Job::Vectors, &mut buf), Ok(0));

		let mut w = buf.w.clone();
		w.sort_by(|x, y| x.re.total_cmp(&y.re));
		assert_approx_eq!(w[0].re, 0.0, 1e-12);
		assert_approx_eq!(w[0].im, -3.0, 1e-12);
		assert_approx_eq!(w[1].re, 1.0, 1e-12);
		assert_approx_eq!(w[1].im, 1.0, 1e-12);
		assert_approx_eq!(w[2].re, 2.0, 1e-12);
		assert_approx_eq!(w[2].im, 0.0, 1e-12);
	}

	#[test]
	fn test_short_buffers_rejected() {
		let mut backend = FaerBackend::default();
		backend.init().unwrap();

		let a = vec![2.0, 0.0, 0.0, 3.0];
		let mut buf = buffers::<f64>(&backend, a.clone(), 2);
		buf.vr.clear();
		assert!(matches!(
			backend.dgeev(Job::NoVectors, Job::Vectors, &mut buf),
			Err(Error::InvalidDimension { len: Some(0), .. })
		));
		assert_eq!(buf.a, a);

		let mut buf = buffers(&backend, vec![Complex64::new(1.0, 0.0)], 1);
		buf.w.clear();
		assert!(backend.zgeev(Job::NoVectors, Job::Vectors, &mut buf).is_err());
	}

	#[test]
	fn test_left_vectors_rejected() {
		let mut backend = FaerBackend::default();
		backend.init().unwrap();
		let mut buf = buffers::<f32>(&backend, vec![1.0], 1);
		assert_eq!(backend.sgeev(Job::Vectors, Job::Vectors, &mut buf), Ok(-1));
	}
}
