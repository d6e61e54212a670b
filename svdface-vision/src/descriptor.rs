use crate::VisionError;
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Shape of the intensity matrices the extractor accepts and how many
/// singular directions it keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub image_size: usize,
    pub rank: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            image_size: 100,
            rank: 10,
        }
    }
}

/// Truncated left-singular basis of a grayscale image, shape `(rows, rank)`.
///
/// Columns are orthonormal when produced by [`extract`]. Nothing re-checks
/// this after deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawDescriptor", try_from = "RawDescriptor")]
pub struct Descriptor {
    basis: Array2<f64>,
}

impl Descriptor {
    /// Wrap an existing basis without checking orthonormality.
    pub fn from_basis(basis: Array2<f64>) -> Self {
        Self { basis }
    }

    pub fn basis(&self) -> ArrayView2<'_, f64> {
        self.basis.view()
    }

    pub fn rows(&self) -> usize {
        self.basis.nrows()
    }

    pub fn rank(&self) -> usize {
        self.basis.ncols()
    }
}

// Flat row-major form so the on-disk layout does not depend on ndarray's
// serde representation.
#[derive(Serialize, Deserialize)]
struct RawDescriptor {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl From<Descriptor> for RawDescriptor {
    fn from(d: Descriptor) -> Self {
        let (rows, cols) = d.basis.dim();
        Self {
            rows,
            cols,
            data: d.basis.iter().copied().collect(),
        }
    }
}

impl TryFrom<RawDescriptor> for Descriptor {
    type Error = ndarray::ShapeError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        Array2::from_shape_vec((raw.rows, raw.cols), raw.data).map(Descriptor::from_basis)
    }
}

fn validate(config: &ExtractorConfig, image: &Array2<f64>) -> Result<(), VisionError> {
    let expected = (config.image_size, config.image_size);
    if image.is_empty() {
        return Err(VisionError::InvalidInput("empty intensity matrix".into()));
    }
    if image.dim() != expected {
        return Err(VisionError::InvalidInput(format!(
            "expected {}x{} intensity matrix, got {}x{}",
            expected.0,
            expected.1,
            image.nrows(),
            image.ncols()
        )));
    }
    if config.rank == 0 || config.rank > config.image_size {
        return Err(VisionError::InvalidInput(format!(
            "rank {} outside 1..={}",
            config.rank, config.image_size
        )));
    }
    if image.iter().any(|v| !v.is_finite()) {
        return Err(VisionError::InvalidInput(
            "intensity matrix contains non-finite values".into(),
        ));
    }
    Ok(())
}

/// Left singular vectors and singular values, ordered by descending
/// singular value.
fn decompose(image: &Array2<f64>) -> Result<(DMatrix<f64>, Vec<f64>, Vec<usize>), VisionError> {
    let (h, w) = image.dim();
    let matrix = DMatrix::from_fn(h, w, |r, c| image[[r, c]]);
    let svd = matrix.svd(true, false);
    let u = svd.u.ok_or(VisionError::Decomposition)?;
    let sigma: Vec<f64> = svd.singular_values.iter().copied().collect();

    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| sigma[b].total_cmp(&sigma[a]));

    Ok((u, sigma, order))
}

/// Compute the descriptor of a `image_size x image_size` intensity matrix:
/// the first `rank` left singular vectors of its SVD.
pub fn extract(config: &ExtractorConfig, image: &Array2<f64>) -> Result<Descriptor, VisionError> {
    validate(config, image)?;
    let (u, _, order) = decompose(image)?;

    let basis = Array2::from_shape_fn((u.nrows(), config.rank), |(r, c)| u[(r, order[c])]);
    log::trace!("extracted {}x{} descriptor", basis.nrows(), basis.ncols());
    Ok(Descriptor::from_basis(basis))
}

/// Singular values of the image in descending order.
pub fn singular_values(config: &ExtractorConfig, image: &Array2<f64>) -> Result<Vec<f64>, VisionError> {
    validate(config, image)?;
    let (_, sigma, order) = decompose(image)?;
    Ok(order.into_iter().map(|i| sigma[i]).collect())
}
