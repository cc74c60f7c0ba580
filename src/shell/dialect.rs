//! Interpreter dialects.
//!
//! The framing script has to be written in the interpreter's own language,
//! so each supported family knows how to compose it.

use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::framing::Sentinel;
use crate::session::SessionContext;

/// Shell language family of the configured interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `sh`, `bash`, `dash`, `zsh` and friends.
    Posix,
    /// Windows PowerShell or PowerShell 7 (`pwsh`).
    PowerShell,
}

impl Dialect {
    /// Guess the dialect from the executable name.
    pub fn detect(path: &str) -> Self {
        match executable_stem(path).as_str() {
            "pwsh" | "powershell" => Dialect::PowerShell,
            _ => Dialect::Posix,
        }
    }

    /// Name used in exit-code messages.
    pub fn label(&self) -> &'static str {
        match self {
            Dialect::Posix => "shell",
            Dialect::PowerShell => "PowerShell",
        }
    }

    /// Launch arguments that keep the interpreter non-interactive and free
    /// of user profiles.
    pub fn args(&self, path: &str) -> Vec<&'static str> {
        match self {
            Dialect::PowerShell => vec![
                "-NoLogo",
                "-NoProfile",
                "-NonInteractive",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                "-",
            ],
            Dialect::Posix => match executable_stem(path).as_str() {
                "bash" => vec!["--noprofile", "--norc"],
                "zsh" => vec!["-f"],
                _ => Vec::new(),
            },
        }
    }

    /// Script that only emits the trailer, used as a readiness probe.
    pub fn frame_probe(&self, sentinel: &Sentinel) -> String {
        let exit = sentinel.exit_marker();
        match self {
            Dialect::Posix => format!(
                "printf '%s%s\\n' '{exit}' 0\nprintf '%s%s\\n' '{exit}' 0 >&2\n"
            ),
            Dialect::PowerShell => format!(
                "[Console]::OutputEncoding = [System.Text.Encoding]::UTF8; \
                 [Console]::Out.WriteLine('{exit}0'); \
                 [Console]::Error.WriteLine('{exit}0')\n"
            ),
        }
    }

    /// Frame `command` so it runs in the tracked cwd with the overlay
    /// applied, then reports the resulting cwd and exit code.
    pub fn frame_command(&self, ctx: &SessionContext, command: &str, sentinel: &Sentinel) -> String {
        match self {
            Dialect::Posix => posix_frame(ctx, command, sentinel),
            Dialect::PowerShell => powershell_frame(ctx, command, sentinel),
        }
    }

    /// Frame a directory change to `path`, resolved against the tracked cwd.
    pub fn frame_change_dir(&self, ctx: &SessionContext, path: &str, sentinel: &Sentinel) -> String {
        let command = match self {
            Dialect::Posix => format!("cd -- {}", sh_quote(path)),
            Dialect::PowerShell => {
                format!("Set-Location -LiteralPath {} -ErrorAction Stop", ps_quote(path))
            }
        };
        self.frame_command(ctx, &command, sentinel)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Posix => write!(f, "posix"),
            Dialect::PowerShell => write!(f, "powershell"),
        }
    }
}

fn executable_stem(path: &str) -> String {
    // Windows paths are split by hand so detection works on any host.
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Single-quote for POSIX shells.
pub(crate) fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}

/// Single-quote for PowerShell.
pub(crate) fn ps_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

// The command runs inside a subshell so `exit` or `set -e` in user text
// cannot take down the interpreter or skip the trailer. The cwd line is
// printed from inside the subshell, where a user `cd` is still in effect.
fn posix_frame(ctx: &SessionContext, command: &str, sentinel: &Sentinel) -> String {
    let (cwd, exit) = (sentinel.cwd_marker(), sentinel.exit_marker());
    let mut script = String::from("(\n");
    script.push_str(&format!("cd -- {} || exit 1\n", sh_quote(ctx.cwd())));
    for (name, value) in ctx.env() {
        script.push_str(&format!("export {}={}\n", name, sh_quote(value)));
    }
    script.push_str(&format!("eval {} </dev/null\n", sh_quote(command)));
    script.push_str("__relay_ec=$?\n");
    script.push_str(&format!("printf '%s%s\\n' '{cwd}' \"$PWD\"\n"));
    script.push_str("exit \"$__relay_ec\"\n");
    script.push_str(")\n");
    script.push_str("__relay_ec=$?\n");
    script.push_str(&format!("printf '%s%s\\n' '{exit}' \"$__relay_ec\"\n"));
    script.push_str(&format!("printf '%s%s\\n' '{exit}' \"$__relay_ec\" >&2\n"));
    script
}

// PowerShell reads `-Command -` line by line, so the whole frame is one
// line. The user portion travels base64-encoded to survive any quoting and
// any console input code page. It runs as a script file so a user `exit`
// ends that script with `$LASTEXITCODE` set instead of ending the host.
fn powershell_frame(ctx: &SessionContext, command: &str, sentinel: &Sentinel) -> String {
    let (cwd, exit) = (sentinel.cwd_marker(), sentinel.exit_marker());
    // Error records name the script path, so it must not contain the token.
    let file_name = format!("{}.ps1", sentinel.token().trim_matches('_').to_ascii_lowercase());
    let mut inner = format!(
        "Set-Location -LiteralPath {} -ErrorAction Stop\n",
        ps_quote(ctx.cwd())
    );
    for (name, value) in ctx.env() {
        inner.push_str(&format!("$env:{} = {}\n", name, ps_quote(value)));
    }
    inner.push_str(command);
    let encoded = BASE64.encode(inner.as_bytes());

    format!(
        "$__relayEc = 0; $global:LASTEXITCODE = 0; $Error.Clear(); \
         $__relayScript = Join-Path ([System.IO.Path]::GetTempPath()) '{file_name}'; \
         try {{ [System.IO.File]::WriteAllText($__relayScript, \
         [System.Text.Encoding]::UTF8.GetString([System.Convert]::FromBase64String('{encoded}')), \
         [System.Text.Encoding]::UTF8); \
         & $__relayScript | Out-String -Stream | ForEach-Object {{ [Console]::Out.WriteLine($_) }}; \
         if ($global:LASTEXITCODE) {{ $__relayEc = $global:LASTEXITCODE }} \
         elseif ($Error.Count -gt 0) {{ $__relayEc = 1 }} }} \
         catch {{ [Console]::Error.WriteLine($_.ToString()); $__relayEc = 1 }} \
         finally {{ [System.IO.File]::Delete($__relayScript) }}; \
         [Console]::Out.WriteLine('{cwd}' + (Get-Location).ProviderPath); \
         [Console]::Out.WriteLine('{exit}' + $__relayEc); \
         [Console]::Error.WriteLine('{exit}' + $__relayEc)\n"
    )
}
