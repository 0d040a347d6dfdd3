use itertools::Itertools;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::fmt::{Display, Formatter};

pub type Extents = SmallVec<[usize; 5]>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DataType {
    Int,
    Uint,
    Float,
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            DataType::Int => write!(f, "int"),
            DataType::Uint => write!(f, "uint"),
            DataType::Float => write!(f, "float"),
        }
    }
}

// flat host-side storage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Buffer {
    Int(Vec<i32>),
    Uint(Vec<u32>),
    Float(Vec<f32>),
}

impl Buffer {
    pub fn data_type(&self) -> DataType {
        match self {
            Buffer::Int(_) => DataType::Int,
            Buffer::Uint(_) => DataType::Uint,
            Buffer::Float(_) => DataType::Float,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Buffer::Int(v) => v.len(),
            Buffer::Uint(v) => v.len(),
            Buffer::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    extents: Extents,
    buffer: Buffer,
}

impl Tensor {
    pub fn new(extents: &[usize], buffer: Buffer) -> Self {
        let size: usize = extents.iter().product();
        if size != buffer.len() {
            panic!(
                "extents ({}) do not match a buffer of {} elements",
                extents.iter().map(|e| e.to_string()).join(", "),
                buffer.len()
            );
        }
        Tensor {
            extents: Extents::from_slice(extents),
            buffer,
        }
    }

    pub fn from_floats(values: Vec<f32>) -> Self {
        Tensor::new(&[values.len()], Buffer::Float(values))
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }

    pub fn data_type(&self) -> DataType {
        self.buffer.data_type()
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn floats(&self) -> Option<&[f32]> {
        match &self.buffer {
            Buffer::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn ints(&self) -> Option<&[i32]> {
        match &self.buffer {
            Buffer::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.data_type(),
            self.extents.iter().map(|e| e.to_string()).join(", ")
        )
    }
}

// a named unit of workspace data: a tensor, or an arbitrary payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Blob {
    Tensor(Tensor),
    Bytes(Vec<u8>),
}

impl Blob {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Blob::Tensor(t) => Some(t),
            Blob::Bytes(_) => None,
        }
    }
}

impl From<Tensor> for Blob {
    fn from(t: Tensor) -> Self {
        Blob::Tensor(t)
    }
}

impl From<Vec<u8>> for Blob {
    fn from(b: Vec<u8>) -> Self {
        Blob::Bytes(b)
    }
}
