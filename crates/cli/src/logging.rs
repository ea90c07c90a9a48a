use crate::config::LoggingConfig;
use regex::Regex;
use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

struct RedactingWriter<W> {
    inner: W,
    patterns: Vec<(Regex, String)>,
}

impl<W: io::Write> io::Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.patterns.is_empty() {
            self.inner.write_all(buf)?;
            return Ok(buf.len());
        }
        let s = String::from_utf8_lossy(buf);
        let mut redacted = s.to_string();
        for (re, replacement) in &self.patterns {
            redacted = re.replace_all(&redacted, replacement.as_str()).to_string();
        }
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter {
    patterns: Vec<(Regex, String)>,
}

impl<'a> fmt::MakeWriter<'a> for RedactingMakeWriter {
    type Writer = RedactingWriter<io::Stderr>;

    fn make_writer(&self) -> Self::Writer {
        RedactingWriter {
            inner: io::stderr(),
            patterns: self.patterns.clone(),
        }
    }
}

fn compile_patterns(config: &LoggingConfig) -> Vec<(Regex, String)> {
    let mut patterns = Vec::new();
    if config.redaction.enabled {
        for p in &config.redaction.patterns {
            match Regex::new(&p.regex) {
                Ok(re) => patterns.push((re, p.placeholder.clone())),
                Err(e) => eprintln!("warning: skipping redaction pattern '{}': {}", p.name, e),
            }
        }
    }
    patterns
}

/// Logs go to stderr so stdout stays clean for command output.
pub fn init_logging(config: &LoggingConfig) {
    // RUST_LOG wins over the configured level.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let make_writer = RedactingMakeWriter {
        patterns: compile_patterns(config),
    };

    // Use Layer::boxed() to unify the types of the branches
    let fmt_layer = match (config.json, config.show_time) {
        (true, _) => fmt::layer()
            .json()
            .with_writer(make_writer)
            .with_file(config.show_file)
            .with_line_number(config.show_line)
            .boxed(),
        (false, false) => fmt::layer()
            .with_writer(make_writer)
            .with_target(config.show_file)
            .with_file(config.show_file)
            .with_line_number(config.show_line)
            .without_time()
            .boxed(),
        (false, true) => fmt::layer()
            .with_writer(make_writer)
            .with_target(config.show_file)
            .with_file(config.show_file)
            .with_line_number(config.show_line)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RedactionConfig, RedactionPattern};
    use std::io::Write;

    fn logging_config(patterns: Vec<RedactionPattern>, enabled: bool) -> LoggingConfig {
        LoggingConfig {
            level: "info".into(),
            json: false,
            show_time: false,
            show_file: false,
            show_line: false,
            redaction: RedactionConfig { enabled, patterns },
        }
    }

    fn ip_pattern() -> RedactionPattern {
        RedactionPattern {
            name: "ipv4".into(),
            regex: r"\b\d{1,3}(\.\d{1,3}){3}\b".into(),
            placeholder: "[ip]".into(),
        }
    }

    #[test]
    fn test_redacting_writer_replaces_matches() {
        let mut writer = RedactingWriter {
            inner: Vec::new(),
            patterns: compile_patterns(&logging_config(vec![ip_pattern()], true)),
        };
        let line = b"device dev1 at 192.168.1.20 online\n";
        assert_eq!(writer.write(line).unwrap(), line.len());
        assert_eq!(
            String::from_utf8(writer.inner).unwrap(),
            "device dev1 at [ip] online\n"
        );
    }

    #[test]
    fn test_disabled_redaction_and_bad_patterns_are_skipped() {
        assert!(compile_patterns(&logging_config(vec![ip_pattern()], false)).is_empty());

        let bad = RedactionPattern {
            name: "broken".into(),
            regex: "(".into(),
            placeholder: "x".into(),
        };
        assert_eq!(
            compile_patterns(&logging_config(vec![bad, ip_pattern()], true)).len(),
            1
        );
    }
}
