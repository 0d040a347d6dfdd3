use tempfile::TempDir;
use tracing::warn;

use crate::engine::Engine;
use crate::error::Error;
use crate::proto::{DeviceOption, OperatorDef, Payload};
use crate::tensor::Blob;
use crate::workspace::Workspace;

// name of the hidden workspace backing an immediate session
pub(crate) const IMMEDIATE_WORKSPACE: &str = "__atelier_immediate__";

/// Per-client immediate session state. The root folder doubles as the
/// active flag: a session is live exactly while the temp dir handle exists.
pub(crate) struct ImmediateState {
    root_folder: Option<TempDir>,
    disclaimed: bool,
}

impl ImmediateState {
    pub(crate) fn new() -> Self {
        ImmediateState {
            root_folder: None,
            disclaimed: false,
        }
    }
}

// Immediate mode runs single operators inside a hidden scratch workspace so
// they can be inspected interactively without disturbing whatever the main
// workspace holds. Strictly a debugging aid; every call pays a full
// switch, run, restore cycle.
impl<E: Engine> Workspace<E> {
    pub fn immediate_active(&self) -> bool {
        self.immediate.root_folder.is_some()
    }

    /// Path of the scratch root folder while a session is live.
    pub fn immediate_root(&self) -> Option<&std::path::Path> {
        self.immediate.root_folder.as_ref().map(|d| d.path())
    }

    /// Open an immediate session. A live session is torn down first, so
    /// every start begins from a fresh scratch workspace and folder.
    /// `acknowledge` suppresses the one-time disclaimer.
    pub fn start_immediate(&mut self, acknowledge: bool) -> Result<(), Error> {
        if self.immediate_active() {
            self.stop_immediate()?;
        }

        let root = TempDir::new().map_err(Error::Io)?;
        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| {
            ws.engine.reset_workspace(Some(root.path()))
        })?;
        self.immediate.root_folder = Some(root);

        if !acknowledge && !self.immediate.disclaimed {
            self.immediate.disclaimed = true;
            warn!(
                "immediate mode is experimental. Operators run one at a time in a \
                 single hidden workspace: sequences must be runnable in order, \
                 resources held there can conflict with the main run, and every \
                 call builds and tears down a temporary operator. Stop the session \
                 as soon as it is no longer needed."
            );
        }
        Ok(())
    }

    /// Close the immediate session. Calling this without a live session is a
    /// no-op. The scratch workspace is reset before the state transition, so
    /// a failing engine leaves the session active and retryable; removing
    /// the folder afterwards is best-effort.
    pub fn stop_immediate(&mut self) -> Result<(), Error> {
        if !self.immediate_active() {
            return Ok(());
        }

        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| ws.engine.reset_workspace(None))?;

        if let Some(root) = self.immediate.root_folder.take() {
            if let Err(e) = root.close() {
                warn!("could not remove immediate root folder: {}", e);
            }
        }
        Ok(())
    }

    fn ensure_immediate(&self) -> Result<(), Error> {
        if self.immediate_active() {
            Ok(())
        } else {
            Err(Error::NotActive)
        }
    }

    pub fn feed_immediate(
        &mut self,
        name: &str,
        value: impl Into<Blob>,
        device: Option<&DeviceOption>,
    ) -> Result<(), Error> {
        self.ensure_immediate()?;
        let value = value.into();
        let device = device.copied();
        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| {
            ws.feed(name, value, device.as_ref())
        })
    }

    pub fn fetch_immediate(&mut self, name: &str) -> Result<Blob, Error> {
        self.ensure_immediate()?;
        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| ws.fetch(name))
    }

    pub fn run_operator_immediate(
        &mut self,
        op: impl Into<Payload<OperatorDef>>,
    ) -> Result<(), Error> {
        self.ensure_immediate()?;
        let payload = op.into();
        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| ws.run_operator_once(payload))
    }

    pub fn immediate_blobs(&mut self) -> Result<Vec<String>, Error> {
        self.ensure_immediate()?;
        self.with_workspace(IMMEDIATE_WORKSPACE, |ws| Ok(ws.blobs()))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::native::{NativeEngine, DEFAULT_WORKSPACE};
    use crate::error::Error;
    use crate::proto::OperatorDef;
    use crate::tensor::Tensor;
    use crate::workspace::Workspace;

    fn workspace() -> Workspace<NativeEngine> {
        Workspace::new(NativeEngine::new())
    }

    #[test]
    fn test_stop_when_inactive_is_noop() {
        let mut ws = workspace();
        assert!(!ws.immediate_active());
        ws.stop_immediate().unwrap();
        ws.stop_immediate().unwrap();
        assert!(!ws.immediate_active());
    }

    #[test]
    fn test_start_creates_scratch_root() {
        let mut ws = workspace();
        ws.start_immediate(true).unwrap();
        assert!(ws.immediate_active());
        let root = ws.immediate_root().unwrap();
        assert!(root.is_dir());
        // the caller's workspace is untouched
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
    }

    #[test]
    fn test_root_present_iff_active() {
        let mut ws = workspace();
        assert_eq!(ws.immediate_root().is_some(), ws.immediate_active());
        ws.start_immediate(true).unwrap();
        assert_eq!(ws.immediate_root().is_some(), ws.immediate_active());
        ws.stop_immediate().unwrap();
        assert_eq!(ws.immediate_root().is_some(), ws.immediate_active());
    }

    #[test]
    fn test_start_twice_replaces_session() {
        let mut ws = workspace();
        ws.start_immediate(true).unwrap();
        ws.feed_immediate("stale", Tensor::from_floats(vec![1.0]), None)
            .unwrap();
        let old_root = ws.immediate_root().unwrap().to_path_buf();

        ws.start_immediate(true).unwrap();
        assert!(ws.immediate_active());
        let new_root = ws.immediate_root().unwrap().to_path_buf();
        assert_ne!(old_root, new_root);
        assert!(!old_root.exists());
        assert!(new_root.is_dir());
        // the fresh scratch workspace starts empty
        assert!(ws.immediate_blobs().unwrap().is_empty());
    }

    #[test]
    fn test_stop_removes_root() {
        let mut ws = workspace();
        ws.start_immediate(true).unwrap();
        let root = ws.immediate_root().unwrap().to_path_buf();
        ws.stop_immediate().unwrap();
        assert!(!ws.immediate_active());
        assert!(!root.exists());
    }

    #[test]
    fn test_delegated_calls_require_session() {
        let mut ws = workspace();
        assert!(matches!(
            ws.feed_immediate("x", Tensor::from_floats(vec![1.0]), None),
            Err(Error::NotActive)
        ));
        assert!(matches!(ws.fetch_immediate("x"), Err(Error::NotActive)));
        assert!(matches!(
            ws.run_operator_immediate(OperatorDef::new("Copy", &["x"], &["y"])),
            Err(Error::NotActive)
        ));
        assert!(matches!(ws.immediate_blobs(), Err(Error::NotActive)));
    }

    #[test]
    fn test_immediate_end_to_end() {
        let mut ws = workspace();
        ws.start_immediate(true).unwrap();

        ws.feed_immediate("x", Tensor::from_floats(vec![1.0, 2.0, 3.0]), None)
            .unwrap();
        let out = ws.fetch_immediate("x").unwrap();
        assert_eq!(out.as_tensor().unwrap().floats().unwrap(), &[1.0, 2.0, 3.0]);

        ws.run_operator_immediate(OperatorDef::new("Copy", &["x"], &["y"]))
            .unwrap();
        let blobs = ws.immediate_blobs().unwrap();
        assert_eq!(blobs, vec!["x".to_string(), "y".to_string()]);

        ws.stop_immediate().unwrap();
        // nothing leaked into the caller's workspace
        assert_eq!(ws.current_workspace(), DEFAULT_WORKSPACE);
        assert!(!ws.has_blob("x"));
        assert!(!ws.has_blob("y"));
    }

    #[test]
    fn test_restart_after_stop() {
        let mut ws = workspace();
        ws.start_immediate(true).unwrap();
        ws.stop_immediate().unwrap();
        ws.start_immediate(true).unwrap();
        assert!(ws.immediate_active());
        ws.stop_immediate().unwrap();
    }
}
