//! Shared helpers for tests that fake a Go project on disk. `GOPATH` is
//! process-global, so every test touching it serializes on one lock.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

pub struct TestProject {
    _guard: MutexGuard<'static, ()>,
    _root: tempfile::TempDir,
    pub project_dir: PathBuf,
}

/// Create a temp `GOPATH` (with an empty package cache) plus a project
/// directory containing a `go.mod` for `example.com/project`.
pub fn project() -> TestProject {
    let guard = ENV_LOCK.lock();
    let root = tempfile::tempdir().expect("create temp dir");
    let gopath = root.path().join("gopath");
    fs::create_dir_all(gopath.join("pkg/mod")).expect("create pkg cache");
    std::env::set_var("GOPATH", &gopath);
    std::env::remove_var("GOROOT");
    let project_dir = root.path().join("project");
    fs::create_dir_all(&project_dir).expect("create project dir");
    write(
        &project_dir.join("go.mod"),
        "module example.com/project\n\ngo 1.21\n",
    );
    TestProject {
        _guard: guard,
        _root: root,
        project_dir,
    }
}

pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dirs");
    }
    fs::write(path, content).expect("write fixture file");
}

impl TestProject {
    pub fn mod_path(&self) -> String {
        crate::files::to_slash(&self.project_dir.join("go.mod"))
    }

    pub fn file(&self, rel: &str, content: &str) {
        write(&self.project_dir.join(rel), content);
    }
}
