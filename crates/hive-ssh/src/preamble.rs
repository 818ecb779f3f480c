//! Remote shell preamble.
//!
//! Login nodes often need environment setup before scheduler binaries are
//! on `PATH`. The remote command is run under `/bin/sh -c` after resetting
//! `PATH` and locale and, when configured, loading an environment module.
//! Statements are joined with `; ` rather than newlines so the string also
//! survives csh-family login shells.

/// Optional environment-module setup on the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSetup {
    /// Script to source first (e.g. `/etc/profile.d/modules.sh`).
    pub init_script: Option<String>,
    /// Module to load (e.g. `slurm`).
    pub module_name: Option<String>,
    /// `modulecmd` binary used when no `module` function exists.
    pub modulecmd_path: Option<String>,
}

const DEFAULT_MODULECMD: &str = "modulecmd";

const PATH_RESET: &str =
    "export PATH=\"/usr/local/bin:/usr/bin:/bin:/usr/local/sbin:/usr/sbin:/sbin${PATH:+:$PATH}\"";
const LOCALE_RESET: &str = "export LANG=C LC_ALL=C";

/// Quote a string for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    let escaped = value.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

/// Wrap `command` in the non-interactive preamble.
pub fn wrap_remote_command(command: &str, modules: &ModuleSetup) -> String {
    let mut statements = vec![PATH_RESET.to_string(), LOCALE_RESET.to_string()];

    if let Some(init) = modules.init_script.as_deref().filter(|s| !s.trim().is_empty()) {
        let init = shell_quote(init);
        statements.push(format!("if [ -r {init} ]; then . {init} >/dev/null 2>&1; fi"));
    }

    if let Some(name) = modules.module_name.as_deref().filter(|s| !s.trim().is_empty()) {
        let name = shell_quote(name);
        let modulecmd = shell_quote(
            modules
                .modulecmd_path
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_MODULECMD),
        );
        statements.push(format!(
            "if command -v module >/dev/null 2>&1; then module load {name} >/dev/null 2>&1; \
             elif command -v {modulecmd} >/dev/null 2>&1; then eval \"$({modulecmd} sh load {name} 2>/dev/null)\"; fi"
        ));
    }

    statements.push(command.to_string());
    format!("/bin/sh -c {}", shell_quote(&statements.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    /// Run the wrapped string the way a remote login shell would.
    fn run_locally(wrapped: &str) -> String {
        let output = Command::new("/bin/sh").arg("-c").arg(wrapped).output().unwrap();
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_wrap_without_modules() {
        let wrapped = wrap_remote_command("squeue --me --json", &ModuleSetup::default());
        assert!(wrapped.starts_with("/bin/sh -c '"));
        assert!(wrapped.contains("LC_ALL=C"));
        assert!(wrapped.contains("squeue --me --json"));
        assert!(!wrapped.contains("module"));
    }

    #[test]
    fn test_wrap_with_modules() {
        let modules = ModuleSetup {
            init_script: Some("/etc/profile.d/modules.sh".to_string()),
            module_name: Some("slurm".to_string()),
            modulecmd_path: Some("/usr/bin/modulecmd".to_string()),
        };
        let wrapped = wrap_remote_command("squeue --me --json", &modules);
        assert!(wrapped.contains("/etc/profile.d/modules.sh"));
        assert!(wrapped.contains("module load"));
        assert!(wrapped.contains("/usr/bin/modulecmd"));
        assert!(!wrapped.contains('\n'));
    }

    #[test]
    fn test_wrapped_command_runs() {
        let wrapped = wrap_remote_command("echo \"hello $LC_ALL\"", &ModuleSetup::default());
        assert_eq!(run_locally(&wrapped).trim(), "hello C");
    }

    #[test]
    fn test_missing_module_system_is_tolerated() {
        let modules = ModuleSetup {
            init_script: Some("/nonexistent/modules.sh".to_string()),
            module_name: Some("slurm".to_string()),
            modulecmd_path: Some("/nonexistent/modulecmd".to_string()),
        };
        let wrapped = wrap_remote_command("echo 'still here'", &modules);
        assert_eq!(run_locally(&wrapped).trim(), "still here");
    }
}
