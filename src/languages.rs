//! Language taxonomy for compilation and execution
//!
//! Supported languages form a closed set. Each language belongs to a driver
//! family and carries a spec describing how source is written, compiled and
//! run inside a sandbox.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported programming languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    C,
    Cpp,
    Java,
}

/// Driver family a language is executed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Source is run directly by its interpreter (write -> run)
    Interpreted,
    /// Source is compiled to a script first (write -> compile -> run)
    Transpiled,
    /// Source is compiled to a native binary (write -> compile -> run)
    Native,
    /// Source is compiled to bytecode and run on the JVM
    Jvm,
}

/// How to execute one language inside a sandbox.
#[derive(Debug, Clone)]
pub struct LanguageSpec {
    /// Name of the source file (e.g., "main.cpp")
    pub source_file: &'static str,
    /// Compile command (None if the language runs from source)
    pub compile_command: Option<Vec<String>>,
    /// Run command
    pub run_command: Vec<String>,
    /// Default end-to-end time budget spanning write + compile + run
    pub time_budget: Duration,
    /// Default container image for this language's sandboxes
    pub default_image: &'static str,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::C,
        Language::Cpp,
        Language::Java,
    ];

    pub fn family(&self) -> Family {
        match self {
            Language::Python | Language::JavaScript => Family::Interpreted,
            Language::TypeScript => Family::Transpiled,
            Language::C | Language::Cpp => Family::Native,
            Language::Java => Family::Jvm,
        }
    }

    /// Built-in execution spec. The per-language time budgets are asymmetric
    /// because compilation shares the same wall-clock budget as execution.
    pub fn spec(&self) -> LanguageSpec {
        match self {
            Language::Python => LanguageSpec {
                source_file: "main.py",
                compile_command: None,
                run_command: into_command("python3 main.py"),
                time_budget: Duration::from_secs(3),
                default_image: "judgelet/python:latest",
            },
            Language::JavaScript => LanguageSpec {
                source_file: "main.js",
                compile_command: None,
                run_command: into_command("node main.js"),
                time_budget: Duration::from_secs(3),
                default_image: "judgelet/node:latest",
            },
            Language::TypeScript => LanguageSpec {
                source_file: "main.ts",
                compile_command: Some(into_command("tsc main.ts")),
                run_command: into_command("node main.js"),
                time_budget: Duration::from_secs(10),
                default_image: "judgelet/node:latest",
            },
            Language::C => LanguageSpec {
                source_file: "main.c",
                compile_command: Some(into_command("gcc -O2 -o main main.c")),
                run_command: into_command("./main"),
                time_budget: Duration::from_secs(10),
                default_image: "judgelet/gcc:latest",
            },
            Language::Cpp => LanguageSpec {
                source_file: "main.cpp",
                compile_command: Some(into_command("g++ -O2 -std=c++17 -o main main.cpp")),
                run_command: into_command("./main"),
                time_budget: Duration::from_secs(10),
                default_image: "judgelet/gcc:latest",
            },
            Language::Java => LanguageSpec {
                source_file: "Main.java",
                compile_command: Some(into_command("javac Main.java")),
                run_command: into_command("java -XX:+UseSerialGC Main"),
                time_budget: Duration::from_secs(15),
                default_image: "judgelet/jdk:latest",
            },
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
        };
        write!(f, "{}", s)
    }
}

/// Submitted language name was not recognized
#[derive(Debug, Error)]
#[error("unsupported language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" | "nodejs" => Ok(Language::JavaScript),
            "typescript" | "ts" => Ok(Language::TypeScript),
            "c" => Ok(Language::C),
            "cpp" | "c++" | "cc" => Ok(Language::Cpp),
            "java" => Ok(Language::Java),
            other => Err(UnknownLanguage(other.to_string())),
        }
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
