use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Static type carried by a value. Two values are interchangeable only when
/// their types compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueType {
    pub dtype: String,
    pub rank: usize,
}

impl ValueType {
    pub fn new(dtype: impl Into<String>, rank: usize) -> Self {
        Self {
            dtype: dtype.into(),
            rank,
        }
    }

    pub fn scalar(dtype: impl Into<String>) -> Self {
        Self::new(dtype, 0)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tensor<{}, rank {}>", self.dtype, self.rank)
    }
}

/// Attribute attached to an operation.
#[derive(Clone)]
pub enum OpAttr {
    Int(i64),
    Bool(bool),
    Str(String),
    Float(f64),
    /// Host payload with no structural identity (callbacks, foreign handles).
    /// An op carrying one cannot be keyed.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl fmt::Debug for OpAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpAttr::Int(v) => write!(f, "Int({v})"),
            OpAttr::Bool(v) => write!(f, "Bool({v})"),
            OpAttr::Str(v) => write!(f, "Str({v:?})"),
            OpAttr::Float(v) => write!(f, "Float({v})"),
            OpAttr::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl PartialEq for OpAttr {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OpAttr::Int(a), OpAttr::Int(b)) => a == b,
            (OpAttr::Bool(a), OpAttr::Bool(b)) => a == b,
            (OpAttr::Str(a), OpAttr::Str(b)) => a == b,
            (OpAttr::Float(a), OpAttr::Float(b)) => a.to_bits() == b.to_bits(),
            (OpAttr::Opaque(a), OpAttr::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Hashable projection of an [`OpAttr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum AttrKey {
    Int(i64),
    Bool(bool),
    Str(String),
    FloatBits(u64),
}

/// Hashable identity of an operation, used to index nodes by what they apply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OpKey {
    pub name: String,
    pub attrs: Vec<(String, AttrKey)>,
}

/// An operation applied by graph nodes.
///
/// `destroy_map` maps an output index to the input indices that output
/// overwrites in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub name: String,
    pub attrs: Vec<(String, OpAttr)>,
    pub destroy_map: BTreeMap<usize, Vec<usize>>,
}

impl Op {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            destroy_map: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, attr: OpAttr) -> Self {
        self.attrs.push((key.into(), attr));
        self
    }

    /// Marks output `output` as computed by overwriting `inputs` in place.
    pub fn destroys(mut self, output: usize, inputs: Vec<usize>) -> Self {
        self.destroy_map.insert(output, inputs);
        self
    }

    pub fn is_inplace(&self, output: usize) -> bool {
        self.destroy_map.contains_key(&output)
    }

    /// Returns the hashable identity of this op, or `None` when an opaque
    /// attribute makes it unhashable.
    pub fn key(&self) -> Option<OpKey> {
        let mut attrs = Vec::with_capacity(self.attrs.len());
        for (name, attr) in &self.attrs {
            let key = match attr {
                OpAttr::Int(v) => AttrKey::Int(*v),
                OpAttr::Bool(v) => AttrKey::Bool(*v),
                OpAttr::Str(v) => AttrKey::Str(v.clone()),
                OpAttr::Float(v) => AttrKey::FloatBits(v.to_bits()),
                OpAttr::Opaque(_) => return None,
            };
            attrs.push((name.clone(), key));
        }
        Some(OpKey {
            name: self.name.clone(),
            attrs,
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.attrs.is_empty() {
            f.write_str("{")?;
            for (idx, (name, attr)) in self.attrs.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name}={attr:?}")?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}
