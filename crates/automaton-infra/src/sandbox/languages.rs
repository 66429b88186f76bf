//! Per-language container image, script extension, and invocation template.

use automaton_types::execution::ExecutionLanguage;

/// Static facts about how a language's script is packaged and invoked.
pub struct LanguageSpec {
    /// Container image used by the Docker dispatch path.
    pub image: &'static str,
    /// Extension the script is written under (`script.<extension>`).
    pub extension: &'static str,
    /// Whether the script file needs the executable bit set (shell scripts
    /// invoked directly rather than via an interpreter argv).
    pub executable_script: bool,
}

pub fn spec(language: ExecutionLanguage) -> LanguageSpec {
    match language {
        ExecutionLanguage::Python => LanguageSpec {
            image: "python:3.12-slim",
            extension: "py",
            executable_script: false,
        },
        ExecutionLanguage::Lua => LanguageSpec {
            image: "nickblah/lua:5.4-alpine",
            extension: "lua",
            executable_script: false,
        },
        ExecutionLanguage::Shell => LanguageSpec {
            image: "alpine:3.19",
            extension: "sh",
            executable_script: true,
        },
        ExecutionLanguage::Rust => LanguageSpec {
            image: "rust:1.75-slim",
            extension: "rs",
            executable_script: false,
        },
        ExecutionLanguage::Go => LanguageSpec {
            image: "golang:1.22-alpine",
            extension: "go",
            executable_script: false,
        },
    }
}

/// Build the argv that invokes `script_path` (already resolved to wherever
/// the caller mounted/wrote it) for `language`.
pub fn invocation(language: ExecutionLanguage, script_path: &str) -> Vec<String> {
    match language {
        ExecutionLanguage::Python => vec!["python3".to_string(), script_path.to_string()],
        ExecutionLanguage::Lua => vec!["lua".to_string(), script_path.to_string()],
        ExecutionLanguage::Shell => vec!["sh".to_string(), script_path.to_string()],
        ExecutionLanguage::Go => vec!["go".to_string(), "run".to_string(), script_path.to_string()],
        ExecutionLanguage::Rust => vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("rustc {script_path} -o /tmp/automaton_exec && /tmp/automaton_exec"),
        ],
    }
}
