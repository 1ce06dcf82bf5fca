use crate::{DType, Element, Error};
use core::ops::{Index, IndexMut};
use equator::assert;
use num_complex::{Complex32, Complex64};
use num_traits::Zero;

/// heap-allocated dense matrix, stored in column-major order.
///
/// element `(i, j)` lives at `data[i + j * nrows]`, so the leading dimension is always equal to
/// the number of rows.
#[derive(Clone, PartialEq)]
pub struct Matrix<T> {
	data: Vec<T>,
	nrows: usize,
	ncols: usize,
}

impl<T: Copy> Matrix<T> {
	/// creates a matrix from column-major storage
	pub fn from_column_major(nrows: usize, ncols: usize, data: Vec<T>) -> Result<Self, Error> {
		check_len(nrows, ncols, data.len())?;
		Ok(Self { data, nrows, ncols })
	}

	/// creates a matrix from row-major storage, which is transposed into column-major order
	pub fn from_row_major(nrows: usize, ncols: usize, data: &[T]) -> Result<Self, Error> {
		check_len(nrows, ncols, data.len())?;
		Ok(Self::from_fn(nrows, ncols, |i, j| data[i * ncols + j]))
	}

	/// creates a matrix whose `(i, j)` element is `f(i, j)`
	pub fn from_fn(nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
		let mut data = Vec::with_capacity(nrows * ncols);
		for j in 0..ncols {
			for i in 0..nrows {
				data.push(f(i, j));
			}
		}
		Self { data, nrows, ncols }
	}

	/// creates a square matrix with `diag` on its diagonal
	pub fn from_diagonal(diag: &[T]) -> Self
	where
		T: Zero,
	{
		let n = diag.len();
		Self::from_fn(n, n, |i, j| if i == j { diag[i] } else { T::zero() })
	}

	pub fn zeros(nrows: usize, ncols: usize) -> Self
	where
		T: Zero,
	{
		Self {
			data: vec![T::zero(); nrows * ncols],
			nrows,
			ncols,
		}
	}

	#[inline]
	pub fn nrows(&self) -> usize {
		self.nrows
	}

	#[inline]
	pub fn ncols(&self) -> usize {
		self.ncols
	}

	#[inline]
	pub fn shape(&self) -> (usize, usize) {
		(self.nrows, self.ncols)
	}

	#[inline]
	pub fn is_square(&self) -> bool {
		self.nrows == self.ncols
	}

	#[inline]
	#[track_caller]
	pub fn read(&self, row: usize, col: usize) -> T {
		self[(row, col)]
	}

	#[inline]
	#[track_caller]
	pub fn write(&mut self, row: usize, col: usize, value: T) {
		self[(row, col)] = value;
	}

	/// column-major storage
	#[inline]
	pub fn as_slice(&self) -> &[T] {
		&self.data
	}

	#[inline]
	pub fn as_mut_slice(&mut self) -> &mut [T] {
		&mut self.data
	}

	#[inline]
	#[track_caller]
	pub fn col(&self, col: usize) -> &[T] {
		assert!(col < self.ncols);
		&self.data[col * self.nrows..(col + 1) * self.nrows]
	}

	#[inline]
	pub fn into_vec(self) -> Vec<T> {
		self.data
	}

	/// returns the matrix with columns reordered so that column `j` is column `perm[j]` of
	/// `self`
	#[track_caller]
	pub(crate) fn permute_cols(&self, perm: &[usize]) -> Self {
		assert!(perm.len() == self.ncols);
		let mut data = Vec::with_capacity(self.data.len());
		for &j in perm {
			data.extend_from_slice(self.col(j));
		}
		Self {
			data,
			nrows: self.nrows,
			ncols: self.ncols,
		}
	}
}

fn check_len(nrows: usize, ncols: usize, len: usize) -> Result<(), Error> {
	match nrows.checked_mul(ncols) {
		Some(expected) if expected == len => Ok(()),
		_ => Err(Error::InvalidDimension {
			nrows,
			ncols,
			len: Some(len),
		}),
	}
}

impl<T> Index<(usize, usize)> for Matrix<T> {
	type Output = T;

	#[inline]
	#[track_caller]
	fn index(&self, (row, col): (usize, usize)) -> &T {
		assert!(all(row < self.nrows, col < self.ncols));
		&self.data[row + col * self.nrows]
	}
}

impl<T> IndexMut<(usize, usize)> for Matrix<T> {
	#[inline]
	#[track_caller]
	fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
		assert!(all(row < self.nrows, col < self.ncols));
		&mut self.data[row + col * self.nrows]
	}
}

impl<T: core::fmt::Debug> core::fmt::Debug for Matrix<T> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		struct Row<'a, T>(&'a Matrix<T>, usize);

		impl<T: core::fmt::Debug> core::fmt::Debug for Row<'_, T> {
			fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
				let Row(mat, i) = *self;
				f.debug_list()
					.entries((0..mat.ncols).map(|j| &mat.data[i + j * mat.nrows]))
					.finish()
			}
		}

		f.debug_list().entries((0..self.nrows).map(|i| Row(self, i))).finish()
	}
}

/// matrix whose element type is only known at runtime
#[derive(Clone, Debug, PartialEq)]
pub enum DynMatrix {
	F32(Matrix<f32>),
	F64(Matrix<f64>),
	C32(Matrix<Complex32>),
	C64(Matrix<Complex64>),
}

impl DynMatrix {
	#[inline]
	pub fn dtype(&self) -> DType {
		match self {
			DynMatrix::F32(_) => DType::F32,
			DynMatrix::F64(_) => DType::F64,
			DynMatrix::C32(_) => DType::C32,
			DynMatrix::C64(_) => DType::C64,
		}
	}

	#[inline]
	pub fn shape(&self) -> (usize, usize) {
		match self {
			DynMatrix::F32(mat) => mat.shape(),
			DynMatrix::F64(mat) => mat.shape(),
			DynMatrix::C32(mat) => mat.shape(),
			DynMatrix::C64(mat) => mat.shape(),
		}
	}

	/// creates a matrix of element type `dtype` from a generator of complex values.
	///
	/// for real types only the real part of each generated value is kept.
	pub fn from_fn(dtype: DType, nrows: usize, ncols: usize, mut f: impl FnMut(usize, usize) -> Complex64) -> Self {
		match dtype {
			DType::F32 => DynMatrix::F32(Matrix::from_fn(nrows, ncols, |i, j| f(i, j).re as f32)),
			DType::F64 => DynMatrix::F64(Matrix::from_fn(nrows, ncols, |i, j| f(i, j).re)),
			DType::C32 => DynMatrix::C32(Matrix::from_fn(nrows, ncols, |i, j| {
				let z = f(i, j);
				Complex32::new(z.re as f32, z.im as f32)
			})),
			DType::C64 => DynMatrix::C64(Matrix::from_fn(nrows, ncols, f)),
		}
	}
}

macro_rules! impl_from {
	($ty: ty, $variant: ident) => {
		impl From<Matrix<$ty>> for DynMatrix {
			#[inline]
			fn from(value: Matrix<$ty>) -> Self {
				DynMatrix::$variant(value)
			}
		}
	};
}

impl_from!(f32, F32);
impl_from!(f64, F64);
impl_from!(Complex32, C32);
impl_from!(Complex64, C64);

impl<T: Element> Matrix<T> {
	/// runtime element type of the matrix
	#[inline]
	pub fn dtype(&self) -> DType {
		T::DTYPE
	}
}
