use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
    pub state_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub prefix: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        Self {
            config_path: root.join("config").join("tuck.yaml"),
            state_dir: root.join("state"),
            cache_dir: root.join("cache"),
            prefix: root.join("prefix"),
            bin_path: PathBuf::from(env!("CARGO_BIN_EXE_tuck")),
            temp_dir,
        }
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("TUCK_CONFIG", &self.config_path);
        cmd.env("TUCK_STATE_DIR", &self.state_dir);
        cmd.env("TUCK_CACHE_DIR", &self.cache_dir);
        cmd.env("HOME", self.temp_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.temp_dir.path().join("xdg-config"));
        cmd.env("XDG_STATE_HOME", self.temp_dir.path().join("xdg-state"));
        cmd.env_remove("RUST_LOG");
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run tuck")
            .into()
    }

    /// A package directory in standard layout: `bin/<name>` and a man page.
    pub fn make_package(&self, dir_name: &str, tool: &str) -> PathBuf {
        let package = self.temp_dir.path().join(dir_name);
        write_executable(&package.join("bin").join(tool));
        let man = package.join("share").join("man").join("man1");
        fs::create_dir_all(&man).expect("Failed to create man dir");
        fs::write(man.join(format!("{}.1", tool)), ".TH TOOL 1\n").expect("Failed to write man page");
        package
    }

    pub fn ledger(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.state_dir.join("installed.json"))
            .expect("Failed to read ledger");
        serde_json::from_str(&text).expect("Ledger was not valid JSON")
    }
}

#[allow(dead_code)]
pub fn write_executable(path: &Path) {
    fs::create_dir_all(path.parent().expect("path has a parent")).expect("Failed to create dir");
    fs::write(path, "#!/bin/sh\necho hello\n").expect("Failed to write file");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("Failed to set permissions");
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
