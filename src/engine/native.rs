use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::{ops, Engine};
use crate::error::Error;
use crate::proto::{self, DeviceOption, NetDef, OperatorDef, PlanDef};
use crate::tensor::Blob;

pub const DEFAULT_WORKSPACE: &str = "default";

struct WorkspaceState {
    // None marks a created-but-never-fed placeholder
    blobs: HashMap<String, Option<Blob>>,
    nets: HashMap<String, NetDef>,
    root_folder: PathBuf,
}

impl WorkspaceState {
    fn new(root_folder: PathBuf) -> Self {
        WorkspaceState {
            blobs: HashMap::new(),
            nets: HashMap::new(),
            root_folder,
        }
    }

    fn reset(&mut self, root_folder: Option<&Path>) {
        self.blobs.clear();
        self.nets.clear();
        if let Some(root) = root_folder {
            self.root_folder = root.to_path_buf();
        }
    }

    fn run_op(&mut self, op: &OperatorDef) -> Result<(), Error> {
        let mut inputs = Vec::with_capacity(op.inputs.len());
        for name in &op.inputs {
            let blob = self
                .blobs
                .get(name)
                .and_then(|b| b.as_ref())
                .ok_or_else(|| {
                    Error::Execution(format!("{} reads missing blob {}", op.op_type, name))
                })?;
            match blob {
                Blob::Tensor(t) => inputs.push(t.clone()),
                Blob::Bytes(_) => {
                    return Err(Error::Execution(format!(
                        "blob {} does not hold a tensor",
                        name
                    )))
                }
            }
        }

        let outputs = ops::run(op, &inputs)?;
        for (name, tensor) in op.outputs.iter().zip(outputs) {
            self.blobs.insert(name.clone(), Some(Blob::Tensor(tensor)));
        }
        Ok(())
    }

    fn run_net_def(&mut self, net: &NetDef) -> Result<(), Error> {
        for op in &net.ops {
            self.run_op(op)?;
        }
        Ok(())
    }

    // Every external input must already be in the workspace, and every op
    // input must be visible when the op runs.
    fn validate_net(&self, net: &NetDef) -> Result<(), Error> {
        for name in &net.external_inputs {
            if !self.blobs.contains_key(name) {
                return Err(Error::Creation(format!(
                    "net {}: external input {} is not in the workspace",
                    net.name, name
                )));
            }
        }

        let mut visible: HashSet<&str> = self.blobs.keys().map(String::as_str).collect();
        for op in &net.ops {
            if !ops::is_known(&op.op_type) {
                return Err(Error::Creation(format!(
                    "net {}: unknown operator type {}",
                    net.name, op.op_type
                )));
            }
            for input in &op.inputs {
                if !visible.contains(input.as_str()) {
                    return Err(Error::Creation(format!(
                        "net {}: {} reads undeclared blob {}",
                        net.name, op.op_type, input
                    )));
                }
            }
            for output in &op.outputs {
                visible.insert(output);
            }
        }
        Ok(())
    }
}

/// In-process reference engine. It keeps every workspace as a plain blob/net
/// map and implements a handful of host-side operators, enough to exercise
/// the layer without an out-of-process engine behind the boundary.
pub struct NativeEngine {
    workspaces: HashMap<String, WorkspaceState>,
    current: String,
    default_root: PathBuf,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("."))
    }

    /// Root folder assigned to workspaces that are created implicitly.
    pub fn with_root(default_root: PathBuf) -> Self {
        let mut workspaces = HashMap::new();
        workspaces.insert(
            DEFAULT_WORKSPACE.to_string(),
            WorkspaceState::new(default_root.clone()),
        );
        NativeEngine {
            workspaces,
            current: DEFAULT_WORKSPACE.to_string(),
            default_root,
        }
    }

    fn ws(&self) -> &WorkspaceState {
        self.workspaces.get(&self.current).unwrap()
    }

    fn ws_mut(&mut self) -> &mut WorkspaceState {
        self.workspaces.get_mut(&self.current).unwrap()
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        NativeEngine::new()
    }
}

impl Engine for NativeEngine {
    fn switch_workspace(&mut self, name: &str, create_if_missing: bool) -> Result<(), Error> {
        if !self.workspaces.contains_key(name) {
            if !create_if_missing {
                return Err(Error::Switch(name.to_string()));
            }
            self.workspaces.insert(
                name.to_string(),
                WorkspaceState::new(self.default_root.clone()),
            );
        }
        self.current = name.to_string();
        debug!("switched to workspace {}", name);
        Ok(())
    }

    fn current_workspace(&self) -> String {
        self.current.clone()
    }

    fn root_folder(&self) -> PathBuf {
        self.ws().root_folder.clone()
    }

    fn reset_workspace(&mut self, root_folder: Option<&Path>) -> Result<(), Error> {
        self.ws_mut().reset(root_folder);
        debug!("workspace {} reset", self.current);
        Ok(())
    }

    fn create_blob(&mut self, name: &str) -> Result<(), Error> {
        self.ws_mut().blobs.entry(name.to_string()).or_insert(None);
        Ok(())
    }

    fn create_net(&mut self, net: &[u8]) -> Result<(), Error> {
        let net: NetDef = proto::decode(net)
            .map_err(|e| Error::Creation(format!("malformed net definition: {}", e)))?;
        let ws = self.ws_mut();
        ws.validate_net(&net)?;
        ws.nets.insert(net.name.clone(), net);
        Ok(())
    }

    fn run_net(&mut self, name: &str) -> Result<(), Error> {
        let net = self
            .ws()
            .nets
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Execution(format!("no net named {}", name)))?;
        self.ws_mut().run_net_def(&net)
    }

    fn run_net_once(&mut self, net: &[u8]) -> Result<(), Error> {
        let net: NetDef = proto::decode(net)
            .map_err(|e| Error::Execution(format!("malformed net definition: {}", e)))?;
        self.ws_mut().run_net_def(&net)
    }

    fn run_operator_once(&mut self, op: &[u8]) -> Result<(), Error> {
        let op: OperatorDef = proto::decode(op)
            .map_err(|e| Error::Execution(format!("malformed operator definition: {}", e)))?;
        self.ws_mut().run_op(&op)
    }

    fn run_plan_once(&mut self, plan: &[u8]) -> Result<(), Error> {
        let plan: PlanDef = proto::decode(plan)
            .map_err(|e| Error::Execution(format!("malformed plan definition: {}", e)))?;
        let nets: HashMap<&str, &NetDef> =
            plan.nets.iter().map(|n| (n.name.as_str(), n)).collect();
        let ws = self.ws_mut();

        if plan.steps.is_empty() {
            for net in &plan.nets {
                ws.run_net_def(net)?;
            }
            return Ok(());
        }

        for step in &plan.steps {
            let net = nets.get(step.net.as_str()).ok_or_else(|| {
                Error::Execution(format!("plan {}: no net named {}", plan.name, step.net))
            })?;
            for _ in 0..step.num_iter {
                ws.run_net_def(net)?;
            }
        }
        Ok(())
    }

    fn feed_blob(
        &mut self,
        name: &str,
        value: Blob,
        device: Option<&DeviceOption>,
    ) -> Result<(), Error> {
        // placement is accepted for boundary compatibility; this engine is
        // host-only and stores every blob on the host
        if let Some(device) = device {
            debug!("feeding blob {} for device {:?}", name, device.device_type);
        }
        self.ws_mut().blobs.insert(name.to_string(), Some(value));
        Ok(())
    }

    fn fetch_blob(&self, name: &str) -> Result<Blob, Error> {
        self.ws()
            .blobs
            .get(name)
            .and_then(|b| b.as_ref())
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn blob_names(&self) -> Vec<String> {
        self.ws().blobs.keys().cloned().sorted().collect_vec()
    }
}
