//! The detector's SSD anchor table.

use std::{ops::Index, path::Path};

use anyhow::{bail, Context};

use super::ANCHOR_COUNT;

/// A single SSD anchor, stored as a center point normalized to the detector input.
#[derive(Debug, Clone, Copy)]
pub struct Anchor {
    x_center: f32,
    y_center: f32,
}

impl Anchor {
    pub fn x_center(&self) -> f32 {
        self.x_center
    }

    pub fn y_center(&self) -> f32 {
        self.y_center
    }
}

/// The full set of anchors of the palm detection network.
///
/// The table is loaded once at startup and then shared, behind an [`Arc`](std::sync::Arc), by
/// everything that decodes detector output against it.
pub struct AnchorTable {
    anchors: Vec<Anchor>,
}

impl AnchorTable {
    /// Loads the anchor table from a plain text file of comma separated values.
    ///
    /// The file must contain exactly [`ANCHOR_COUNT`] rows of 4 values each (`x, y, w, h`,
    /// normalized to the detector input). Only the center coordinates are used; the sizes are
    /// carried in the file for compatibility with its original producer.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to open anchor file {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("malformed anchor file {}", path.display()))
    }

    fn parse(contents: &str) -> anyhow::Result<Self> {
        let expected = ANCHOR_COUNT * 4;
        let mut values = Vec::with_capacity(expected);
        for token in contents
            .split(|c: char| c == ',' || c.is_ascii_whitespace())
            .filter(|token| !token.is_empty())
        {
            if values.len() == expected {
                bail!("more values than expected ({expected})");
            }
            let value = token
                .parse::<f32>()
                .with_context(|| format!("invalid anchor value {token:?}"))?;
            values.push(value);
        }
        if values.len() < expected {
            bail!("fewer values than expected ({} < {expected})", values.len());
        }

        Ok(Self::from_values(&values))
    }

    fn from_values(values: &[f32]) -> Self {
        let anchors = values
            .chunks_exact(4)
            .map(|row| Anchor {
                x_center: row[0],
                y_center: row[1],
            })
            .collect();
        Self { anchors }
    }

    /// Creates a table from normalized anchor center points.
    ///
    /// Useful for tests and for detector variants with a non-standard anchor layout.
    pub fn from_centers<I: IntoIterator<Item = (f32, f32)>>(centers: I) -> Self {
        Self {
            anchors: centers
                .into_iter()
                .map(|(x_center, y_center)| Anchor { x_center, y_center })
                .collect(),
        }
    }

    /// Returns the total number of anchors in the table.
    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Anchor> + '_ {
        self.anchors.iter()
    }
}

impl Index<usize> for AnchorTable {
    type Output = Anchor;

    fn index(&self, index: usize) -> &Anchor {
        &self.anchors[index]
    }
}
