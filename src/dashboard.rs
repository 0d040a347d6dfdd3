use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Child, Command};
use tracing::info;

use crate::engine::Engine;
use crate::error::Error;
use crate::workspace::Workspace;

const PREFERRED_PORT: u16 = 5000;

/// Pick a port for the dashboard: 5000 when nothing is listening there,
/// otherwise an ephemeral one.
pub fn free_port() -> Result<u16, Error> {
    if TcpStream::connect(("127.0.0.1", PREFERRED_PORT)).is_err() {
        return Ok(PREFERRED_PORT);
    }
    let listener = TcpListener::bind(("127.0.0.1", 0)).map_err(Error::Io)?;
    let port = listener.local_addr().map_err(Error::Io)?.port();
    // Between dropping the listener and the dashboard binding, another
    // process can grab the port. Tolerated: this is a convenience tool for
    // interactive work, not a service.
    Ok(port)
}

/// Spawn the diagnostic dashboard as a child process, pointed at a root
/// folder of run artifacts. Defaults: the active workspace's root folder
/// and a `free_port` port. The caller owns the returned child.
pub fn launch<E: Engine>(
    ws: &Workspace<E>,
    program: &str,
    root_folder: Option<&Path>,
    port: Option<u16>,
) -> Result<Child, Error> {
    let root = match root_folder {
        Some(path) => path.to_path_buf(),
        None => ws.root_folder(),
    };
    let port = match port {
        Some(p) => p,
        None => free_port()?,
    };

    let child = Command::new(program)
        .arg("-p")
        .arg(port.to_string())
        .arg("-r")
        .arg(&root)
        .spawn()
        .map_err(Error::Io)?;

    info!("dashboard running at http://127.0.0.1:{}", port);
    Ok(child)
}
