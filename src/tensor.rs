//! Tensor types for exchanging data with the neural networks.
//!
//! The two inference stages consume and produce flat `f32` buffers with an explicit shape. A
//! [`Tensor`] owns such a buffer, a [`TensorView`] borrows part of one. All indexing is
//! bounds-checked against the shape.

use std::fmt;

use tinyvec::TinyVec;

/// Stores the shape and strides of a tensor, inline if they are small enough.
#[derive(Clone)]
struct Layout(TinyVec<[usize; 8]>);

impl Layout {
    fn from_shape(shape: &[usize]) -> Self {
        let mut vec = TinyVec::from(shape);
        vec.resize(shape.len() * 2, 0);

        // Row-major strides, with the last dimension changing the fastest.
        let mut stride = 1;
        for dim in (0..shape.len()).rev() {
            vec[shape.len() + dim] = stride;
            stride *= shape[dim];
        }
        Self(vec)
    }

    fn shape(&self) -> &[usize] {
        &self.0[..self.0.len() / 2]
    }

    fn strides(&self) -> &[usize] {
        &self.0[self.0.len() / 2..]
    }

    fn elements(&self) -> usize {
        self.shape().iter().product()
    }

    fn remove_prefix(&self, num: usize) -> Layout {
        assert!(num <= self.shape().len());
        let mut vec = TinyVec::with_capacity((self.shape().len() - num) * 2);
        vec.extend_from_slice(&self.shape()[num..]);
        vec.extend_from_slice(&self.strides()[num..]);
        Layout(vec)
    }
}

/// Advances `index` to the next element of `shape`, in row-major order.
///
/// Returns `false` once `index` has wrapped back to all zeroes.
fn advance<const N: usize>(index: &mut [usize; N], shape: &[usize; N]) -> bool {
    for dim in (0..N).rev() {
        index[dim] += 1;
        if index[dim] < shape[dim] {
            return true;
        }
        index[dim] = 0;
    }
    false
}

/// An owned tensor with dynamic shape and `f32` elements.
#[derive(Clone)]
pub struct Tensor {
    layout: Layout,
    data: Box<[f32]>,
}

impl Tensor {
    /// Creates a tensor of the given shape by invoking `f` for every element.
    ///
    /// `f` is called with each index vector in row-major order, starting at `[0, ..., 0]`.
    pub fn from_shape_fn<const N: usize, F>(shape: [usize; N], mut f: F) -> Self
    where
        F: FnMut([usize; N]) -> f32,
    {
        let layout = Layout::from_shape(&shape);
        let mut data = Vec::with_capacity(layout.elements());
        if layout.elements() != 0 {
            let mut index = [0; N];
            loop {
                data.push(f(index));
                if !advance(&mut index, &shape) {
                    break;
                }
            }
        }
        Self {
            layout,
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape from an iterator over its elements, in row-major
    /// order.
    ///
    /// # Panics
    ///
    /// Panics unless `iter` yields exactly as many elements as `shape` requires.
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let layout = Layout::from_shape(shape);
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            layout.elements(),
            "iterator yielded {} elements, shape {:?} requires {}",
            data.len(),
            shape,
            layout.elements(),
        );
        Self { layout, data }
    }

    /// Returns the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Returns the flat element buffer, in row-major order.
    pub fn as_raw_data(&self) -> &[f32] {
        &self.data
    }

    /// Borrows the whole tensor as a [`TensorView`].
    pub fn view(&self) -> TensorView<'_> {
        TensorView {
            layout: self.layout.clone(),
            data: &self.data,
        }
    }

    /// Indexes the first `N` dimensions, yielding a view of the remaining ones.
    ///
    /// Indexing a tensor of shape `[1, B, 18]` with `[0, i]` yields a view of shape `[18]`.
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any entry is out
    /// of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.view().index(indices)
    }

    /// Returns an iterator over the subtensors along the first dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        assert_ne!(
            self.rank(),
            0,
            "attempted to iterate over tensor of rank 0"
        );
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the tensor's elements as a slice, if `self` is of rank 1.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as a slice",
            self.shape()
        );
        &self.data
    }

    /// Returns the single element of a rank-0 tensor.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor of shape {:?} as a singular value",
            self.shape()
        );
        self.data[0]
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_iter(&[N], arr)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}

/// An immutable view of part of a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    layout: Layout,
    data: &'a [f32],
}

impl<'a> TensorView<'a> {
    /// Returns the number of entries in each dimension.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Returns the number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape().len()
    }

    /// Indexes the first `N` dimensions, yielding a view of the remaining ones.
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any entry is out
    /// of bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape(),
            indices
        );

        let mut data = self.data;
        for ((length, stride), &index) in self
            .layout
            .shape()
            .iter()
            .copied()
            .zip(self.layout.strides().iter().copied())
            .zip(&indices)
        {
            assert!(
                index < length,
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape(),
                indices
            );
            data = &data[index * stride..(index + 1) * stride];
        }

        TensorView {
            layout: self.layout.remove_prefix(N),
            data,
        }
    }

    /// Returns an iterator over the subtensors along the first dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'a>> + '_ {
        assert_ne!(
            self.rank(),
            0,
            "attempted to iterate over tensor view of rank 0"
        );
        (0..self.shape()[0]).map(|index| self.index([index]))
    }

    /// Returns the view's elements as a slice, if `self` is of rank 1.
    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as a slice",
            self.shape()
        );
        self.data
    }

    /// Returns the single element of a rank-0 view.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor view of shape {:?} as a singular value",
            self.shape()
        );
        self.data[0]
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}
