#![allow(dead_code)]

pub mod command;
pub mod file;

/// Read a loose reference file below `.git`, trimmed
pub fn read_git_file(dir: &std::path::Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(".git").join(name))
        .unwrap_or_else(|e| panic!("Failed to read .git/{name}: {e}"))
        .trim()
        .to_string()
}

/// Lines of a command's stdout
pub fn stdout_lines(output: &std::process::Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}
