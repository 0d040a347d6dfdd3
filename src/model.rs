use tracing::debug;

use crate::engine::Engine;
use crate::error::Error;
use crate::proto::{DeviceOption, NetDef};
use crate::tensor::Blob;
use crate::workspace::Workspace;

/// A created net plus the bookkeeping needed to drive it: ordered input and
/// output names and the placement inputs are staged with. The workspace is
/// passed to every call rather than captured, so one model can be run
/// against different clients.
#[derive(Debug)]
pub struct Model {
    name: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    device: DeviceOption,
}

impl Model {
    /// Stage `parameters` into the workspace under their names, then create
    /// the net. Parameters are fed with the net's own placement; `device`
    /// overrides the placement used for inputs at run time.
    pub fn new<E: Engine>(
        ws: &mut Workspace<E>,
        net: NetDef,
        parameters: Vec<(String, Blob)>,
        inputs: Vec<String>,
        outputs: Vec<String>,
        device: Option<DeviceOption>,
    ) -> Result<Self, Error> {
        let run_device = device.or(net.device).unwrap_or_default();
        let net_device = net.device;

        // a net needs all of its parameter blobs in place before creation
        for (name, value) in parameters {
            debug!("feeding parameter {}", name);
            ws.feed(&name, value, net_device.as_ref())?;
        }

        let name = net.name.clone();
        let input_names: Vec<&str> = inputs.iter().map(String::as_str).collect();
        ws.create_net(net, &input_names)?;

        Ok(Model {
            name,
            inputs,
            outputs,
            device: run_device,
        })
    }

    /// Feed one value per declared input, run the net once, and fetch the
    /// declared outputs in order. The arity check comes first: on a
    /// mismatch nothing is staged and nothing runs.
    pub fn run<E: Engine>(
        &self,
        ws: &mut Workspace<E>,
        inputs: Vec<Blob>,
    ) -> Result<Vec<Blob>, Error> {
        if inputs.len() != self.inputs.len() {
            return Err(Error::Arity {
                expected: self.inputs.len(),
                given: inputs.len(),
            });
        }

        for (name, value) in self.inputs.iter().zip(inputs) {
            ws.feed(name, value, Some(&self.device))?;
        }
        ws.run_net(&self.name)?;

        self.outputs.iter().map(|name| ws.fetch(name)).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_names(&self) -> &[String] {
        &self.inputs
    }

    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    pub fn device(&self) -> DeviceOption {
        self.device
    }
}
