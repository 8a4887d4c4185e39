//! Named variable blocks and state vectors.
//!
//! A [`VarLayout`] maps block names to stable (offset, len) slices of a flat
//! state vector. Layouts are immutable and shared via `Arc`, so a name
//! resolves to the same indices in every snapshot of a trajectory.

use crate::error::{CoreError, CoreResult};
use nalgebra::DVector;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Block {
    name: String,
    offset: usize,
    len: usize,
}

/// Immutable ordered layout of named variable blocks.
#[derive(Debug)]
pub struct VarLayout {
    blocks: Vec<Block>,
    by_name: HashMap<String, usize>,
    dim: usize,
}

impl VarLayout {
    /// Build a layout from ordered `(name, len)` pairs.
    ///
    /// Duplicate names and zero-length blocks are configuration errors.
    pub fn new<S: Into<String>>(blocks: Vec<(S, usize)>) -> CoreResult<Arc<Self>> {
        let mut out = Vec::with_capacity(blocks.len());
        let mut by_name = HashMap::with_capacity(blocks.len());
        let mut offset = 0;

        for (name, len) in blocks {
            let name = name.into();
            if len == 0 {
                return Err(CoreError::InvalidArg {
                    what: "zero-length variable block",
                });
            }
            if by_name.insert(name.clone(), out.len()).is_some() {
                return Err(CoreError::DuplicateVar { name });
            }
            out.push(Block { name, offset, len });
            offset += len;
        }

        Ok(Arc::new(Self {
            blocks: out,
            by_name,
            dim: offset,
        }))
    }

    /// Single anonymous block covering the whole vector.
    pub fn flat(dim: usize) -> CoreResult<Arc<Self>> {
        Self::new(vec![("y", dim)])
    }

    /// Total dimension of a state vector over this layout.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `(offset, len)` of a named block.
    pub fn block(&self, name: &str) -> CoreResult<(usize, usize)> {
        self.by_name
            .get(name)
            .map(|&i| (self.blocks[i].offset, self.blocks[i].len))
            .ok_or_else(|| CoreError::UnknownVar {
                name: name.to_string(),
            })
    }

    /// Block names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.name.as_str())
    }
}

/// A flat numeric state vector tied to a shared [`VarLayout`].
#[derive(Debug, Clone)]
pub struct StateVec {
    layout: Arc<VarLayout>,
    data: DVector<f64>,
}

impl StateVec {
    /// Wrap a data vector; its length must match the layout dimension.
    pub fn new(layout: Arc<VarLayout>, data: DVector<f64>) -> CoreResult<Self> {
        if data.len() != layout.dim() {
            return Err(CoreError::Dimension {
                what: "state vector",
                expected: layout.dim(),
                got: data.len(),
            });
        }
        Ok(Self { layout, data })
    }

    /// Build layout and state together from ordered `(name, values)` pairs.
    pub fn from_blocks<S: Into<String>>(blocks: Vec<(S, Vec<f64>)>) -> CoreResult<Self> {
        let mut spec = Vec::with_capacity(blocks.len());
        let mut data = Vec::new();
        for (name, values) in blocks {
            spec.push((name.into(), values.len()));
            data.extend(values);
        }
        let layout = VarLayout::new(spec)?;
        Self::new(layout, DVector::from_vec(data))
    }

    /// Flat anonymous state from a plain vector.
    pub fn from_vec(data: Vec<f64>) -> CoreResult<Self> {
        let layout = VarLayout::flat(data.len())?;
        Self::new(layout, DVector::from_vec(data))
    }

    pub fn layout(&self) -> &Arc<VarLayout> {
        &self.layout
    }

    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Slice of the named block.
    pub fn get(&self, name: &str) -> CoreResult<&[f64]> {
        let (offset, len) = self.layout.block(name)?;
        Ok(&self.data.as_slice()[offset..offset + len])
    }

    /// Replace the data, keeping the layout. Length is checked.
    pub fn with_data(&self, data: DVector<f64>) -> CoreResult<Self> {
        Self::new(Arc::clone(&self.layout), data)
    }
}
