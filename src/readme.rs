//! Field extraction from README markdown.
//!
//! READMEs are loosely structured, so every extraction is best effort: a
//! section is located by heading name and read until the next heading (or
//! the end of the document). A missing section gives an empty result, never
//! an error.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Capabilities shorter or longer than this are dropped.
const CAPABILITY_MIN_CHARS: usize = 3;
const CAPABILITY_MAX_CHARS: usize = 200;

const INSTALL_MAX_BLOCKS: usize = 2;
const INSTALL_MAX_PER_BLOCK: usize = 3;
const INSTALL_MAX_TOTAL: usize = 6;

/// Fence info strings treated as shell snippets.
const SHELL_FENCES: &[&str] = &["", "bash", "shell", "sh", "console", "zsh"];

static CAPABILITY_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#{2,6}\s*(features|tools|capabilities|what\b.*\bdoes)").unwrap()
});

static INSTALL_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^#{2,6}\s*(installation|install|setup|getting started)").unwrap()
});

static ANY_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}(\s|$)").unwrap());

static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+(.+)$").unwrap());

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());

static NODE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"node(?:\.?js)?\s*v?(\d+(?:\.\d+)*\+?)").unwrap());
static PYTHON_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"python\s*v?(\d+\.\d+(?:\.\d+)?\+?)").unwrap());
static GO_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"go\s*v?(\d+\.\d+(?:\.\d+)?\+?)").unwrap());
static RUST_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rust\s*v?(\d+\.\d+(?:\.\d+)?\+?)").unwrap());

/// Runtime and package manager guessed from a README.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeHint {
    pub runtime: String,
    pub package_manager: Option<String>,
}

/// Everything the enrichment pass takes from a README.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadmeInfo {
    pub capabilities: Vec<String>,
    pub install_commands: Vec<String>,
    pub runtime: Option<RuntimeHint>,
    pub requirements: Vec<String>,
}

pub fn analyze(readme: &str, max_capabilities: usize) -> ReadmeInfo {
    ReadmeInfo {
        capabilities: extract_capabilities(readme, max_capabilities),
        install_commands: extract_install_commands(readme),
        runtime: detect_runtime(readme),
        requirements: detect_requirements(readme),
    }
}

/// Return the body of the first section whose heading matches `heading`.
///
/// The body ends at the next heading that is not inside a fenced code block.
/// Info string of a fence line, for both backtick and tilde fences.
fn fence_info(line: &str) -> Option<&str> {
    line.strip_prefix("```").or_else(|| line.strip_prefix("~~~"))
}

fn section<'a>(markdown: &'a str, heading: &Regex) -> Option<Vec<&'a str>> {
    let mut in_fence = false;
    let mut body: Option<Vec<&str>> = None;

    for line in markdown.lines() {
        let trimmed = line.trim_start();
        let is_fence = fence_info(trimmed).is_some();

        match body.as_mut() {
            None => {
                if is_fence {
                    in_fence = !in_fence;
                } else if !in_fence && heading.is_match(trimmed) {
                    body = Some(Vec::new());
                }
            }
            Some(lines) => {
                if is_fence {
                    in_fence = !in_fence;
                } else if !in_fence && ANY_HEADING.is_match(trimmed) {
                    break;
                }
                lines.push(line);
            }
        }
    }

    body
}

/// Bullet points from the features/tools/capabilities section.
pub fn extract_capabilities(readme: &str, max: usize) -> Vec<String> {
    let Some(lines) = section(readme, &CAPABILITY_HEADING) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut capabilities = Vec::new();

    for line in lines {
        let Some(caps) = BULLET.captures(line) else {
            continue;
        };
        let text = clean_bullet(&caps[1]);
        let len = text.chars().count();
        if !(CAPABILITY_MIN_CHARS..=CAPABILITY_MAX_CHARS).contains(&len) {
            continue;
        }
        if seen.insert(text.clone()) {
            capabilities.push(text);
            if capabilities.len() >= max {
                break;
            }
        }
    }

    capabilities
}

/// Remove markdown links from a bullet. A bullet that is nothing but a link
/// keeps the link text.
fn clean_bullet(raw: &str) -> String {
    let stripped = collapse_whitespace(&LINK.replace_all(raw, ""));
    if !stripped.is_empty() {
        return stripped;
    }
    collapse_whitespace(&LINK.replace_all(raw, "$1"))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shell commands from fenced blocks in the installation section.
pub fn extract_install_commands(readme: &str) -> Vec<String> {
    let Some(lines) = section(readme, &INSTALL_HEADING) else {
        return Vec::new();
    };

    let mut commands = Vec::new();
    let mut blocks_used = 0;
    // Some(n) while inside a shell block that has yielded n commands.
    let mut shell_block: Option<usize> = None;
    let mut in_other_block = false;

    for line in lines {
        let trimmed = line.trim();

        if let Some(info) = fence_info(trimmed) {
            if shell_block.is_some() || in_other_block {
                if shell_block.take().is_some() {
                    blocks_used += 1;
                }
                in_other_block = false;
            } else if blocks_used < INSTALL_MAX_BLOCKS
                && SHELL_FENCES.contains(&info.trim().to_lowercase().as_str())
            {
                shell_block = Some(0);
            } else {
                in_other_block = true;
            }
            continue;
        }

        if let Some(taken) = shell_block.as_mut() {
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if *taken < INSTALL_MAX_PER_BLOCK && commands.len() < INSTALL_MAX_TOTAL {
                let command = trimmed.strip_prefix("$ ").unwrap_or(trimmed);
                commands.push(command.to_string());
                *taken += 1;
            }
        }
    }

    commands
}

/// First-match cascade over well-known ecosystems.
pub fn detect_runtime(readme: &str) -> Option<RuntimeHint> {
    let lower = readme.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let (name, package_manager, version_re) = if has(&["node", "npm", "npx"]) {
        ("Node.js", "npm", &*NODE_VERSION)
    } else if has(&["python", "pip", "uvx"]) {
        ("Python", "pip", &*PYTHON_VERSION)
    } else if has(&["golang"]) {
        ("Go", "go", &*GO_VERSION)
    } else if has(&["cargo", "rust"]) {
        ("Rust", "cargo", &*RUST_VERSION)
    } else {
        return None;
    };

    let runtime = match version_re.captures(&lower) {
        Some(caps) => format!("{} {}", name, &caps[1]),
        None => name.to_string(),
    };

    Some(RuntimeHint {
        runtime,
        package_manager: Some(package_manager.to_string()),
    })
}

/// External prerequisites mentioned anywhere in the README.
pub fn detect_requirements(readme: &str) -> Vec<String> {
    let lower = readme.to_lowercase();
    let mut requirements = Vec::new();
    if lower.contains("docker") {
        requirements.push("Docker".to_string());
    }
    if lower.contains("api key") || lower.contains("token") {
        requirements.push("API Key".to_string());
    }
    requirements
}

/// First `max_chars` characters of the README.
pub fn excerpt(readme: &str, max_chars: usize) -> String {
    readme.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_bullets_with_links_stripped() {
        let readme = "## Features\n- Fast\n- [Link](http://x) thing\n- Secure";
        assert_eq!(
            extract_capabilities(readme, 15),
            vec!["Fast", "thing", "Secure"]
        );
    }

    #[test]
    fn link_only_bullet_keeps_link_text() {
        let readme = "## Tools\n- [Query the database](docs/query.md)\n";
        assert_eq!(extract_capabilities(readme, 15), vec!["Query the database"]);
    }

    #[test]
    fn section_ends_at_next_heading() {
        let readme = "# Title\n## Capabilities\n- Read files\n## Usage\n- Not a capability\n";
        assert_eq!(extract_capabilities(readme, 15), vec!["Read files"]);
    }

    #[test]
    fn capabilities_deduped_filtered_and_capped() {
        let mut readme = String::from("### What this server does\n- ab\n- Repeat me\n- Repeat me\n");
        readme.push_str(&format!("- {}\n", "x".repeat(201)));
        for i in 0..30 {
            readme.push_str(&format!("- Capability number {}\n", i));
        }
        let caps = extract_capabilities(&readme, 15);
        assert_eq!(caps.len(), 15);
        assert_eq!(caps[0], "Repeat me");
        assert_eq!(caps[1], "Capability number 0");
    }

    #[test]
    fn missing_heading_is_empty() {
        assert!(extract_capabilities("just some text\n- bullet here", 15).is_empty());
        assert!(extract_install_commands("no install section").is_empty());
    }

    #[test]
    fn install_commands_from_shell_blocks() {
        let readme = "\
## Installation

```bash
# install globally
npm install -g @acme/mcp-server

$ acme-mcp --help
```

```json
{\"mcpServers\": {}}
```

```
pip install acme
```

```sh
echo third block ignored
```

## Usage
";
        assert_eq!(
            extract_install_commands(readme),
            vec![
                "npm install -g @acme/mcp-server",
                "acme-mcp --help",
                "pip install acme"
            ]
        );
    }

    #[test]
    fn comment_lines_in_code_do_not_end_section() {
        let readme = "## Setup\n```bash\n# step one\nmake\n# step two\nmake install\n```\n";
        assert_eq!(extract_install_commands(readme), vec!["make", "make install"]);
    }

    #[test]
    fn tilde_fences_hold_install_commands() {
        let readme = "## Installation\n~~~bash\nuvx acme-mcp\n~~~\n~~~\nnpx acme\n~~~\n";
        assert_eq!(extract_install_commands(readme), vec!["uvx acme-mcp", "npx acme"]);
    }

    #[test]
    fn install_commands_capped_per_block() {
        let readme = "## Install\n```sh\na\nb\nc\nd\n```\n";
        assert_eq!(extract_install_commands(readme), vec!["a", "b", "c"]);
    }

    #[test]
    fn runtime_cascade_first_match_wins() {
        let hint = detect_runtime("Requires Node.js 18+ and python 3.11").unwrap();
        assert_eq!(hint.runtime, "Node.js 18+");
        assert_eq!(hint.package_manager.as_deref(), Some("npm"));

        let hint = detect_runtime("Install with pip. Needs Python 3.10").unwrap();
        assert_eq!(hint.runtime, "Python 3.10");

        let hint = detect_runtime("Built with golang").unwrap();
        assert_eq!(hint.runtime, "Go");

        assert!(detect_runtime("A plain description").is_none());
    }

    #[test]
    fn requirements_detected() {
        assert_eq!(
            detect_requirements("Run in Docker with your API key"),
            vec!["Docker", "API Key"]
        );
        assert!(detect_requirements("nothing needed").is_empty());
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("ab", 10), "ab");
    }
}
