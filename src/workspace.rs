use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::engine::Engine;
use crate::error::Error;
use crate::proto::{DeviceOption, NetDef, OperatorDef, Payload, PlanDef};
use crate::tensor::Blob;
use crate::workspace::immediate::ImmediateState;

pub mod immediate;

/// Host-side handle over an engine. It owns the engine value, so the
/// process-wide "current workspace" pointer can only move through `&mut
/// self`; two callers cannot interleave switch/restore pairs without putting
/// the whole value behind a lock themselves.
pub struct Workspace<E: Engine> {
    engine: E,
    immediate: ImmediateState,
}

impl<E: Engine> Workspace<E> {
    pub fn new(engine: E) -> Self {
        Workspace {
            engine,
            immediate: ImmediateState::new(),
        }
    }

    pub fn current_workspace(&self) -> String {
        self.engine.current_workspace()
    }

    pub fn switch_workspace(&mut self, name: &str, create_if_missing: bool) -> Result<(), Error> {
        self.engine.switch_workspace(name, create_if_missing)
    }

    pub fn root_folder(&self) -> PathBuf {
        self.engine.root_folder()
    }

    /// Scoped switch: remember the active workspace, enter `target` (created
    /// when absent), run `f`, and restore the previous workspace no matter
    /// how `f` exits. A failure to enter `target` returns before `f` runs,
    /// with the original workspace still active.
    pub fn with_workspace<T, F>(&mut self, target: &str, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Self) -> Result<T, Error>,
    {
        let previous = self.engine.current_workspace();
        self.engine.switch_workspace(target, true)?;
        let out = f(self);
        let restored = self.engine.switch_workspace(&previous, false);
        match out {
            // the block's error is the root cause; restoration was attempted
            // either way
            Err(e) => Err(e),
            Ok(v) => restored.map(|_| v),
        }
    }

    /// Drop all blobs and nets of the active workspace. A given root folder
    /// is created on disk when missing; `None` keeps the current root.
    pub fn reset_workspace(&mut self, root_folder: Option<&Path>) -> Result<(), Error> {
        if let Some(root) = root_folder {
            if !root.exists() {
                fs::create_dir_all(root).map_err(Error::Io)?;
            }
        }
        self.engine.reset_workspace(root_folder)
    }

    pub fn create_blob(&mut self, name: &str) -> Result<(), Error> {
        self.engine.create_blob(name)
    }

    /// Register a net. The declared runtime inputs are created as
    /// placeholder blobs first, so the net's external inputs resolve even
    /// before the first `feed`.
    pub fn create_net(
        &mut self,
        net: impl Into<Payload<NetDef>>,
        input_blobs: &[&str],
    ) -> Result<(), Error> {
        for name in input_blobs {
            self.engine.create_blob(name)?;
        }
        let bytes = net.into().into_bytes()?;
        self.engine.create_net(&bytes)
    }

    pub fn run_net(&mut self, name: &str) -> Result<(), Error> {
        debug!("running net {}", name);
        self.engine.run_net(name)
    }

    pub fn run_net_once(&mut self, net: impl Into<Payload<NetDef>>) -> Result<(), Error> {
        let bytes = net.into().into_bytes()?;
        self.engine.run_net_once(&bytes)
    }

    pub fn run_operator_once(&mut self, op: impl Into<Payload<OperatorDef>>) -> Result<(), Error> {
        let bytes = op.into().into_bytes()?;
        self.engine.run_operator_once(&bytes)
    }

    /// Run a sequence of operators, stopping at the first failure.
    pub fn run_operators_once<I>(&mut self, ops: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = OperatorDef>,
    {
        for op in ops {
            self.run_operator_once(op)?;
        }
        Ok(())
    }

    pub fn run_plan_once(&mut self, plan: impl Into<Payload<PlanDef>>) -> Result<(), Error> {
        let bytes = plan.into().into_bytes()?;
        self.engine.run_plan_once(&bytes)
    }

    pub fn feed(
        &mut self,
        name: &str,
        value: impl Into<Blob>,
        device: Option<&DeviceOption>,
    ) -> Result<(), Error> {
        self.engine.feed_blob(name, value.into(), device)
    }

    pub fn fetch(&self, name: &str) -> Result<Blob, Error> {
        self.engine.fetch_blob(name)
    }

    pub fn blobs(&self) -> Vec<String> {
        self.engine.blob_names()
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.engine.blob_names().iter().any(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::native::{NativeEngine, DEFAULT_WORKSPACE};
    use crate::engine::Engine;
    use crate::error::Error;
    use crate::proto::{Argument, DeviceOption, NetDef, OperatorDef};
    use crate::tensor::{Blob, Tensor};
    use crate::workspace::Workspace;
    use std::path::{Path, PathBuf};

    fn workspace() -> Workspace<NativeEngine> {
        Workspace::new(NativeEngine::new())
    }

    // engine that refuses to enter one particular workspace
    struct FlakyEngine {
        inner: NativeEngine,
        deny: &'static str,
    }

    impl Engine for FlakyEngine {
        fn switch_workspace(&mut self, name: &str, create_if_missing: bool) -> Result<(), Error> {
            if name == self.deny {
                return Err(Error::Switch(name.to_string()));
            }
            self.inner.switch_workspace(name, create_if_missing)
        }

        fn current_workspace(&self) -> String {
            self.inner.current_workspace()
        }

        fn root_folder(&self) -> PathBuf {
            self.inner.root_folder()
        }

        fn reset_workspace(&mut self, root_folder: Option<&Path>) -> Result<(), Error> {
            self.inner.reset_workspace(root_folder)
        }

        fn create_blob(&mut self, name: &str) -> Result<(), Error> {
            self.inner.create_blob(name)
        }

        fn create_net(&mut self, net: &[u8]) -> Result<(), Error> {
            self.inner.create_net(net)
        }

        fn run_net(&mut self, name: &str) -> Result<(), Error> {
            self.inner.run_net(name)
        }

        fn run_net_once(&mut self, net: &[u8]) -> Result<(), Error> {
            self.inner.run_net_once(net)
        }

        fn run_operator_once(&mut self, op: &[u8]) -> Result<(), Error> {
            self.inner.run_operator_once(op)
        }

        fn run_plan_once(&mut self, plan: &[u8]) -> Result<(), Error> {
            self.inner.run_plan_once(plan)
        }

        fn feed_blob(
            &mut self,
            name: &str,
            value: Blob,
            device: Option<&DeviceOption>,
        ) -> Result<(), Error> {
            self.inner.feed_blob(name, value, device)
        }

        fn fetch_blob(&self, name: &str) -> Result<Blob, Error> {
            self.inner.fetch_blob(name)
        }

        fn blob_names(&self) -> Vec<String> {
            self.inner.blob_names()
        }
    }

    #[test]
    fn test_guard_restores_after_block() {
        let mut ws = workspace();
        ws.with_workspace("scratch", |ws| {
            assert_eq!(ws.current_workspace(), "scratch");
            ws.feed("x", Tensor::from_floats(vec![1.0]), None)
        })
        .unwrap();
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
        assert!(!ws.has_blob("x"));
    }

    #[test]
    fn test_guard_restores_after_failing_block() {
        let mut ws = workspace();
        let err = ws
            .with_workspace("scratch", |ws| {
                ws.feed("x", Tensor::from_floats(vec![1.0]), None)?;
                ws.fetch("missing").map(|_| ())
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
    }

    #[test]
    fn test_guard_switch_failure_leaves_origin_active() {
        let mut ws = Workspace::new(FlakyEngine {
            inner: NativeEngine::new(),
            deny: "forbidden",
        });
        let err = ws
            .with_workspace("forbidden", |_| -> Result<(), Error> {
                panic!("the block must not run");
            })
            .unwrap_err();
        assert!(matches!(err, Error::Switch(_)));
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
    }

    #[test]
    fn test_guard_nested() {
        let mut ws = workspace();
        ws.with_workspace("outer", |ws| {
            ws.with_workspace("inner", |ws| {
                assert_eq!(ws.current_workspace(), "inner");
                Ok(())
            })?;
            assert_eq!(ws.current_workspace(), "outer");
            Ok(())
        })
        .unwrap();
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
    }

    #[test]
    fn test_feed_fetch_roundtrip() {
        let mut ws = workspace();
        ws.feed("x", Tensor::from_floats(vec![1.0, 2.0, 3.0]), None)
            .unwrap();
        let out = ws.fetch("x").unwrap();
        assert_eq!(out.as_tensor().unwrap().floats().unwrap(), &[1.0, 2.0, 3.0]);
        assert!(matches!(ws.fetch("y"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_run_operator_once() {
        let mut ws = workspace();
        ws.feed("x", Tensor::from_floats(vec![4.0]), None).unwrap();
        ws.run_operator_once(OperatorDef::new("Copy", &["x"], &["y"]))
            .unwrap();
        assert_eq!(
            ws.fetch("y").unwrap().as_tensor().unwrap().floats().unwrap(),
            &[4.0]
        );
    }

    #[test]
    fn test_run_operators_once_stops_at_first_failure() {
        let mut ws = workspace();
        let ops = vec![
            OperatorDef::new("ConstantFill", &[], &["a"])
                .arg("shape", Argument::Ints(vec![1]))
                .arg("value", Argument::Float(1.0)),
            OperatorDef::new("Boom", &[], &["b"]),
            OperatorDef::new("ConstantFill", &[], &["c"])
                .arg("shape", Argument::Ints(vec![1]))
                .arg("value", Argument::Float(1.0)),
        ];
        let err = ws.run_operators_once(ops).unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
        assert!(ws.has_blob("a"));
        assert!(!ws.has_blob("c"));
    }

    #[test]
    fn test_create_net_precreates_inputs() {
        let mut ws = workspace();
        let net = NetDef::new("copier")
            .op(OperatorDef::new("Copy", &["in"], &["out"]))
            .external_input("in")
            .external_output("out");
        ws.create_net(net, &["in"]).unwrap();
        assert!(ws.has_blob("in"));
        // the placeholder was never fed
        assert!(matches!(ws.fetch("in"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_reset_workspace_creates_root_folder() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("runs").join("0");
        let mut ws = workspace();
        ws.feed("x", Tensor::from_floats(vec![1.0]), None).unwrap();
        ws.reset_workspace(Some(&root)).unwrap();
        assert!(root.is_dir());
        assert!(ws.blobs().is_empty());
        assert_eq!(ws.root_folder(), root);
    }
}
