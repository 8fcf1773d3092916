//! AWS CLI command execution.

use colored::Colorize;
use regex::Regex;
use std::error::Error;
use std::process::Command;
use std::sync::OnceLock;

/// Upper bound on captured stdout; describe calls stay far below it.
const MAX_STDOUT_BYTES: usize = 2_000_000;

static ARG_REGEX: OnceLock<Regex> = OnceLock::new();

fn arg_regex() -> &'static Regex {
    ARG_REGEX.get_or_init(|| {
        Regex::new(r#"'([^']*)'\s*|\"([^\"]*)\"\s*|([^'\s]*)\s*"#).expect("Invalid Regex")
    })
}

/// Run a CLI command line and return its stdout.
///
/// The line is split on whitespace; single or double quoted substrings are
/// kept as one argument with the quotes removed. No shell is involved, so
/// wildcards such as `Values=webapp_*` reach the CLI unexpanded.
///
/// # Returns
/// * `Ok(String)` - stdout of a successful run
/// * `Err` - spawn failure, non-zero exit, oversized or non UTF-8 output
pub fn run(cmd: &str) -> Result<String, Box<dyn Error>> {
    log::debug!("run({cmd})", cmd = cmd.on_blue());

    let args = split_args(cmd);
    log::trace!("split args={:?}", args);
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| format!("Empty command line: {cmd:?}"))?;

    let output = Command::new(program).args(rest).output().map_err(|e| {
        log::error!("Command execution failed: {}", e);
        format!("Failed to execute {program}: {e}")
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::trace!(
            "code={code:?}\n┎######\nstderr=\n{stderr}\n┖######",
            code = output.status.code(),
            stderr = stderr.red()
        );
        log::warn!(
            "{failed} to run {cmd}",
            failed = "failed".on_red(),
            cmd = cmd.on_blue()
        );
        return Err(format!("ERROR running {program}: {stderr}").into());
    }

    log::debug!("Success stdout.len()={}", output.stdout.len());
    if output.stdout.len() > MAX_STDOUT_BYTES {
        return Err(format!(
            "Response too large: {} bytes for command: {cmd}",
            output.stdout.len()
        )
        .into());
    }

    let stdout = String::from_utf8(output.stdout).map_err(|e| format!("Invalid UTF-8: {e}"))?;
    Ok(stdout)
}

/// Split a command line into arguments, keeping quoted substrings whole.
fn split_args(input: &str) -> Vec<&str> {
    arg_regex()
        .find_iter(input)
        .map(|m| m.as_str().trim().trim_matches('\'').trim_matches('"'))
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_describe_images() {
        let input = "aws ec2 describe-images --owners self 'Name=name,Values=webapp *' --output json";
        assert_eq!(
            split_args(input),
            vec![
                "aws",
                "ec2",
                "describe-images",
                "--owners",
                "self",
                "Name=name,Values=webapp *",
                "--output",
                "json"
            ]
        );
    }

    #[test]
    fn test_split_keeps_wildcards() {
        assert_eq!(
            split_args("aws ec2 describe-images --filters Name=name,Values=webapp_*"),
            vec!["aws", "ec2", "describe-images", "--filters", "Name=name,Values=webapp_*"]
        );
    }

    #[test]
    fn test_split_double_quotes() {
        assert_eq!(
            split_args(r#"aws route53 list-hosted-zones-by-name --dns-name "dev.example.com""#),
            vec!["aws", "route53", "list-hosted-zones-by-name", "--dns-name", "dev.example.com"]
        );
    }

    #[test]
    fn test_empty_command_is_error() {
        assert!(run("   ").is_err());
    }
}
