use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::proto::DeviceOption;
use crate::tensor::Blob;

pub mod native;
pub(crate) mod ops;

/// The call boundary to a tensor execution engine. Everything behind it is
/// opaque to this crate: kernels, memory planning, device dispatch and graph
/// execution all live on the engine side. Calls are synchronous and either
/// succeed or fail; none suspend.
pub trait Engine {
    /// Make `name` the active workspace, creating it when `create_if_missing`
    /// is set. On failure the previously active workspace stays active.
    fn switch_workspace(&mut self, name: &str, create_if_missing: bool) -> Result<(), Error>;

    fn current_workspace(&self) -> String;

    /// Root folder of the active workspace.
    fn root_folder(&self) -> PathBuf;

    /// Drop all blobs and nets of the active workspace. `root_folder` moves
    /// the workspace to a new root; `None` keeps the current one.
    fn reset_workspace(&mut self, root_folder: Option<&Path>) -> Result<(), Error>;

    /// Insert an uninitialized placeholder blob.
    fn create_blob(&mut self, name: &str) -> Result<(), Error>;

    /// Register a serialized `NetDef` under its name.
    fn create_net(&mut self, net: &[u8]) -> Result<(), Error>;

    /// Execute a previously created net once.
    fn run_net(&mut self, name: &str) -> Result<(), Error>;

    fn run_net_once(&mut self, net: &[u8]) -> Result<(), Error>;

    fn run_operator_once(&mut self, op: &[u8]) -> Result<(), Error>;

    fn run_plan_once(&mut self, plan: &[u8]) -> Result<(), Error>;

    fn feed_blob(
        &mut self,
        name: &str,
        value: Blob,
        device: Option<&DeviceOption>,
    ) -> Result<(), Error>;

    fn fetch_blob(&self, name: &str) -> Result<Blob, Error>;

    fn blob_names(&self) -> Vec<String>;
}
