//! Byte buffers in and out of the runtime's private filesystem.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use nes_backend::{BackendError, BackendResult};

use crate::call::SyncCallBridge;
use crate::runtime::ScriptValue;

/// Stages files between host storage and the sandboxed filesystem, one
/// synchronous evaluation per transfer.
///
/// Virtual paths derive from the host file's base name; nothing guarantees a
/// virtual file's survival across runtime restarts.
pub struct VirtualFileChannel {
    calls: SyncCallBridge,
}

impl VirtualFileChannel {
    pub(crate) fn new(calls: SyncCallBridge) -> Self {
        Self { calls }
    }

    /// Copy the host file into the sandboxed filesystem, returning the
    /// virtual path it was written under.
    pub fn import_file(&self, host_path: &Path) -> BackendResult<String> {
        let bytes = fs::read(host_path)?;
        let virtual_path = virtual_path_for(host_path)?;
        let script = format!(
            "NESBridge.writeFile({}, {});",
            js_string(&virtual_path),
            js_string(&BASE64.encode(bytes))
        );
        self.calls.eval(&script)?;
        Ok(virtual_path)
    }

    /// Copy a virtual file out to host storage. The host file is not
    /// created when the virtual path does not exist or the read fails.
    pub fn export_file(&self, virtual_path: &str, host_path: &Path) -> BackendResult<()> {
        let script = format!("NESBridge.readFile({});", js_string(virtual_path));
        match self.calls.eval(&script)? {
            ScriptValue::Bytes(bytes) => {
                fs::write(host_path, bytes)?;
                Ok(())
            }
            ScriptValue::Null => Err(BackendError::VirtualFileMissing(virtual_path.to_owned())),
            other => Err(BackendError::ContractViolation {
                expected: "a byte buffer",
                got: other.type_name().to_owned(),
            }),
        }
    }
}

/// Virtual path a host file stages under: its base name.
pub(crate) fn virtual_path_for(host_path: &Path) -> BackendResult<String> {
    host_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_owned)
        .ok_or_else(|| BackendError::InvalidPath(host_path.to_owned()))
}

/// Single-quoted script string literal with the two metacharacters escaped.
pub(crate) fn js_string(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('\'');
    for ch in text.chars() {
        match ch {
            '\'' | '\\' => {
                literal.push('\\');
                literal.push(ch);
            }
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            _ => literal.push(ch),
        }
    }
    literal.push('\'');
    literal
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::host::RuntimeHost;
    use crate::readiness::ReadinessGate;
    use crate::router::CallbackRouter;
    use crate::testing::{ScriptedNesRuntime, CORE_PAYLOAD};
    use crate::EMPTY_DOCUMENT;

    #[test]
    fn moves_bytes_in_and_out_of_the_sandbox() {
        let router = CallbackRouter::new(Arc::new(ReadinessGate::new()));
        let host = RuntimeHost::spawn(
            Box::new(ScriptedNesRuntime::new()),
            router,
            CORE_PAYLOAD.to_owned(),
            EMPTY_DOCUMENT.to_owned(),
        )
        .unwrap();
        let calls = SyncCallBridge::new(host.handle(), Duration::from_secs(5));
        let files = VirtualFileChannel::new(calls.clone());
        let dir = tempfile::tempdir().unwrap();

        // Export of a virtual path that was never written fails and must
        // not create the host file.
        let target = dir.path().join("never.state");
        let err = files.export_file("never.state", &target).unwrap_err();
        assert!(matches!(err, BackendError::VirtualFileMissing(_)));
        assert!(!target.exists());

        let source = dir.path().join("rom.nes");
        std::fs::write(&source, b"NES\x1a data").unwrap();
        let virtual_path = files.import_file(&source).unwrap();
        assert_eq!(virtual_path, "rom.nes");
        let copy = dir.path().join("rom-copy.nes");
        files.export_file(&virtual_path, &copy).unwrap();
        assert_eq!(std::fs::read(&copy).unwrap(), b"NES\x1a data");

        // Importing an unreadable host path is an I/O failure.
        let err = files.import_file(&dir.path().join("ghost.nes")).unwrap_err();
        assert!(matches!(err, BackendError::Io(_)));

        // A raised evaluation error surfaces from the calling operation.
        let err = calls.eval("NESExplode();").unwrap_err();
        assert!(matches!(err, BackendError::Evaluation(_)));

        drop(files);
        drop(calls);
    }

    #[test]
    fn virtual_paths_use_the_base_name() {
        assert_eq!(
            virtual_path_for(Path::new("/saves/deep/mario.nes")).unwrap(),
            "mario.nes"
        );
    }

    #[test]
    fn js_string_escapes_metacharacters() {
        assert_eq!(js_string("mario.nes"), "'mario.nes'");
        assert_eq!(js_string("it's\\here"), r"'it\'s\\here'");
        assert_eq!(js_string("a\nb"), r"'a\nb'");
    }
}
