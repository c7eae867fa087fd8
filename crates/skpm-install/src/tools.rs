//! Agent tool integration targets.
//!
//! | Tool     | Marker      | Link                                   |
//! |----------|-------------|----------------------------------------|
//! | claude   | `.claude`   | `.claude/agents/<skill>`               |
//! | codex    | `.codex`    | `.codex/<skill>`                       |
//! | cursor   | `.cursor`   | `.cursor/rules/<skill>/<file>.mdc`     |
//! | windsurf | `.windsurf` | `.windsurf/rules/<skill>`              |
//! | gemini   | `.gemini`   | `.gemini/rules/<skill>`                |
//! | copilot  | `.github`   | `.github/<skill>`                      |
//!
//! Links point at the skill's exposed alias, so re-pointing the alias
//! re-targets every tool.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use skpm_registry::integrity::list_files;
use tracing::debug;

use crate::error::{InstallError, Result};
use crate::link::{remove_path, replace_symlink};
use crate::store::exposed_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tool {
    Claude,
    Codex,
    Cursor,
    Windsurf,
    Gemini,
    Copilot,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Claude,
        Tool::Codex,
        Tool::Cursor,
        Tool::Windsurf,
        Tool::Gemini,
        Tool::Copilot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Claude => "claude",
            Tool::Codex => "codex",
            Tool::Cursor => "cursor",
            Tool::Windsurf => "windsurf",
            Tool::Gemini => "gemini",
            Tool::Copilot => "copilot",
        }
    }

    /// Directory whose presence means the project uses this tool.
    pub fn marker(self) -> &'static str {
        match self {
            Tool::Claude => ".claude",
            Tool::Codex => ".codex",
            Tool::Cursor => ".cursor",
            Tool::Windsurf => ".windsurf",
            Tool::Gemini => ".gemini",
            Tool::Copilot => ".github",
        }
    }

    /// Link location for `skill`. For cursor this is the per-skill rules
    /// directory holding one link per markdown file.
    pub fn link_path(self, project_root: &Path, skill: &str) -> PathBuf {
        match self {
            Tool::Claude => project_root.join(".claude").join("agents").join(skill),
            Tool::Codex => project_root.join(".codex").join(skill),
            Tool::Cursor => project_root.join(".cursor").join("rules").join(skill),
            Tool::Windsurf => project_root.join(".windsurf").join("rules").join(skill),
            Tool::Gemini => project_root.join(".gemini").join("rules").join(skill),
            Tool::Copilot => project_root.join(".github").join(skill),
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = InstallError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Tool::ALL
            .into_iter()
            .find(|t| t.name() == lower)
            .ok_or_else(|| InstallError::UnknownTool {
                name: s.trim().to_string(),
            })
    }
}

/// Tools whose marker directory exists in `project_root`.
pub fn detect_tools(project_root: &Path) -> Vec<Tool> {
    Tool::ALL
        .into_iter()
        .filter(|t| project_root.join(t.marker()).is_dir())
        .collect()
}

/// Parse target names. Entries may be comma-separated; duplicates collapse.
pub fn parse_targets<S: AsRef<str>>(targets: &[S]) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();
    for entry in targets {
        for part in entry.as_ref().split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let tool: Tool = part.parse()?;
            if !tools.contains(&tool) {
                tools.push(tool);
            }
        }
    }
    Ok(tools)
}

/// Create `skill`'s links for `targets`, or for every detected tool when
/// `targets` is empty. Returns the tools linked.
pub fn link_tool_targets<S: AsRef<str>>(
    project_root: &Path,
    skill: &str,
    targets: &[S],
) -> Result<Vec<Tool>> {
    let explicit = parse_targets(targets)?;
    let tools = if explicit.is_empty() {
        detect_tools(project_root)
    } else {
        explicit
    };

    let alias = exposed_path(project_root, skill);
    for tool in &tools {
        let link = tool.link_path(project_root, skill);
        match tool {
            Tool::Cursor => link_markdown_rules(&alias, &link)?,
            _ => replace_symlink(&alias, &link)?,
        }
        debug!(%tool, %skill, link = %link.display(), "linked");
    }
    Ok(tools)
}

/// `rules/<skill>/<path>.mdc` → `<alias>/<path>.md` for every markdown file.
fn link_markdown_rules(alias: &Path, rules_dir: &Path) -> Result<()> {
    remove_path(rules_dir)?;
    std::fs::create_dir_all(rules_dir).map_err(|e| InstallError::io(rules_dir, e))?;
    for relative in list_files(alias)? {
        let Some(stem) = relative.strip_suffix(".md") else {
            continue;
        };
        replace_symlink(&alias.join(&relative), &rules_dir.join(format!("{stem}.mdc")))?;
    }
    Ok(())
}

/// Remove every tool link for `skill`, whatever tools are in use.
pub fn remove_tool_links(project_root: &Path, skill: &str) -> Result<()> {
    for tool in Tool::ALL {
        remove_path(&tool.link_path(project_root, skill))?;
    }
    Ok(())
}
