use rayon::prelude::*;

use crate::error::Error;
use crate::proto::{Argument, OperatorDef};
use crate::tensor::{Buffer, Tensor};

pub(crate) fn is_known(op_type: &str) -> bool {
    matches!(
        op_type,
        "Copy" | "ConstantFill" | "Add" | "Sub" | "Mul" | "Scale"
    )
}

/// Execute one operator against already-resolved input tensors. Output order
/// matches `op.outputs`.
pub(crate) fn run(op: &OperatorDef, inputs: &[Tensor]) -> Result<Vec<Tensor>, Error> {
    match op.op_type.as_str() {
        "Copy" => {
            check_io(op, 1, 1)?;
            Ok(vec![inputs[0].clone()])
        }
        "ConstantFill" => {
            check_io(op, 0, 1)?;
            Ok(vec![constant_fill(op)?])
        }
        "Add" => {
            check_io(op, 2, 1)?;
            Ok(vec![binary(op, &inputs[0], &inputs[1], |a, b| a + b, |a, b| a + b, |a, b| a + b)?])
        }
        "Sub" => {
            check_io(op, 2, 1)?;
            Ok(vec![binary(op, &inputs[0], &inputs[1], |a, b| a - b, |a, b| a - b, u32::wrapping_sub)?])
        }
        "Mul" => {
            check_io(op, 2, 1)?;
            Ok(vec![binary(op, &inputs[0], &inputs[1], |a, b| a * b, |a, b| a * b, |a, b| a * b)?])
        }
        "Scale" => {
            check_io(op, 1, 1)?;
            Ok(vec![scale(op, &inputs[0])?])
        }
        other => Err(Error::Execution(format!("unknown operator type {}", other))),
    }
}

fn check_io(op: &OperatorDef, inputs: usize, outputs: usize) -> Result<(), Error> {
    if op.inputs.len() != inputs || op.outputs.len() != outputs {
        return Err(Error::Execution(format!(
            "{} expects {} inputs and {} outputs, got {} and {}",
            op.op_type,
            inputs,
            outputs,
            op.inputs.len(),
            op.outputs.len()
        )));
    }
    Ok(())
}

fn constant_fill(op: &OperatorDef) -> Result<Tensor, Error> {
    let extents: Vec<usize> = match op.args.get("shape") {
        Some(Argument::Ints(dims)) => dims.iter().map(|&d| d as usize).collect(),
        None => vec![1],
        Some(_) => {
            return Err(Error::Execution(
                "ConstantFill shape must be an int list".to_string(),
            ))
        }
    };
    let size: usize = extents.iter().product();

    let buffer = match op.args.get("value") {
        None => Buffer::Float(vec![0.0; size]),
        Some(Argument::Float(v)) => Buffer::Float(vec![*v; size]),
        Some(Argument::Int(v)) => Buffer::Int(vec![*v as i32; size]),
        Some(_) => {
            return Err(Error::Execution(
                "ConstantFill value must be an int or a float".to_string(),
            ))
        }
    };

    Ok(Tensor::new(&extents, buffer))
}

fn scale(op: &OperatorDef, x: &Tensor) -> Result<Tensor, Error> {
    let factor = match op.args.get("scale") {
        Some(Argument::Float(v)) => *v,
        None => 1.0,
        Some(_) => return Err(Error::Execution("Scale factor must be a float".to_string())),
    };

    match x.buffer() {
        Buffer::Float(v) => {
            let scaled = v.par_iter().map(|a| a * factor).collect();
            Ok(Tensor::new(x.extents(), Buffer::Float(scaled)))
        }
        _ => Err(Error::Execution(format!(
            "Scale expects float data, got {}",
            x.data_type()
        ))),
    }
}

fn binary(
    op: &OperatorDef,
    a: &Tensor,
    b: &Tensor,
    ff: fn(f32, f32) -> f32,
    fi: fn(i32, i32) -> i32,
    fu: fn(u32, u32) -> u32,
) -> Result<Tensor, Error> {
    if a.extents() != b.extents() {
        return Err(Error::Execution(format!(
            "{}: extent mismatch between {} and {}",
            op.op_type, a, b
        )));
    }

    let buffer = match (a.buffer(), b.buffer()) {
        (Buffer::Float(x), Buffer::Float(y)) => Buffer::Float(binary_map(x, y, ff)),
        (Buffer::Int(x), Buffer::Int(y)) => Buffer::Int(binary_map(x, y, fi)),
        (Buffer::Uint(x), Buffer::Uint(y)) => Buffer::Uint(binary_map(x, y, fu)),
        _ => {
            return Err(Error::Execution(format!(
                "{}: data types do not match ({} vs {})",
                op.op_type,
                a.data_type(),
                b.data_type()
            )))
        }
    };

    Ok(Tensor::new(a.extents(), buffer))
}

fn binary_map<T: Copy + Send + Sync>(a: &[T], b: &[T], f: fn(T, T) -> T) -> Vec<T> {
    a.par_iter().zip(b.par_iter()).map(|(a, b)| f(*a, *b)).collect()
}
