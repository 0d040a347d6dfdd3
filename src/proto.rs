use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DeviceType {
    Cpu,
    OpenCl,
}

// placement specifier carried on nets, operators and feeds
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeviceOption {
    pub device_type: DeviceType,
    pub device_id: u32,
}

impl Default for DeviceOption {
    fn default() -> Self {
        DeviceOption {
            device_type: DeviceType::Cpu,
            device_id: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Int(i64),
    Float(f32),
    String(String),
    Ints(Vec<i64>),
    Floats(Vec<f32>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatorDef {
    pub op_type: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub args: HashMap<String, Argument>,
    pub device: Option<DeviceOption>,
}

impl OperatorDef {
    pub fn new(op_type: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        OperatorDef {
            op_type: op_type.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            args: HashMap::new(),
            device: None,
        }
    }

    pub fn arg(mut self, name: &str, value: Argument) -> Self {
        self.args.insert(name.to_string(), value);
        self
    }

    pub fn device(mut self, device: DeviceOption) -> Self {
        self.device = Some(device);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetDef {
    pub name: String,
    pub ops: Vec<OperatorDef>,
    pub external_inputs: Vec<String>,
    pub external_outputs: Vec<String>,
    pub device: Option<DeviceOption>,
}

impl NetDef {
    pub fn new(name: &str) -> Self {
        NetDef {
            name: name.to_string(),
            ops: Vec::new(),
            external_inputs: Vec::new(),
            external_outputs: Vec::new(),
            device: None,
        }
    }

    pub fn op(mut self, op: OperatorDef) -> Self {
        self.ops.push(op);
        self
    }

    pub fn external_input(mut self, name: &str) -> Self {
        self.external_inputs.push(name.to_string());
        self
    }

    pub fn external_output(mut self, name: &str) -> Self {
        self.external_outputs.push(name.to_string());
        self
    }

    pub fn device(mut self, device: DeviceOption) -> Self {
        self.device = Some(device);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub net: String,
    pub num_iter: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanDef {
    pub name: String,
    pub nets: Vec<NetDef>,
    pub steps: Vec<ExecutionStep>,
}

impl PlanDef {
    pub fn new(name: &str) -> Self {
        PlanDef {
            name: name.to_string(),
            nets: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn net(mut self, net: NetDef) -> Self {
        self.nets.push(net);
        self
    }

    pub fn step(mut self, net: &str, num_iter: u64) -> Self {
        self.steps.push(ExecutionStep {
            net: net.to_string(),
            num_iter,
        });
        self
    }
}

// definition messages that may cross the engine boundary
pub trait Message: Serialize + DeserializeOwned {}

impl Message for OperatorDef {}
impl Message for NetDef {}
impl Message for PlanDef {}

/// A definition handed to the engine: either bytes already in wire form, or
/// a structured message that still has to be encoded. One conversion point
/// instead of probing the value at every call site.
pub enum Payload<T> {
    Raw(Vec<u8>),
    Message(T),
}

impl<T: Message> Payload<T> {
    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        match self {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Message(msg) => {
                bincode::serialize(&msg).map_err(|e| Error::Creation(e.to_string()))
            }
        }
    }
}

impl From<OperatorDef> for Payload<OperatorDef> {
    fn from(m: OperatorDef) -> Self {
        Payload::Message(m)
    }
}

impl From<NetDef> for Payload<NetDef> {
    fn from(m: NetDef) -> Self {
        Payload::Message(m)
    }
}

impl From<PlanDef> for Payload<PlanDef> {
    fn from(m: PlanDef) -> Self {
        Payload::Message(m)
    }
}

impl<T> From<Vec<u8>> for Payload<T> {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(bytes)
    }
}

pub(crate) fn decode<T: Message>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}
