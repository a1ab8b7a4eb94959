use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use tracing::warn;

use pcr_exec::Check;
use pcr_model::ResultType;

/// One passive-check result as sent to the collector, without the trailing newline.
///
/// ```text
/// [1700000000] PROCESS_SERVICE_CHECK_RESULT;web1;load;0;OK - load 0.1|load1=0.1
/// [1700000000] PROCESS_HOST_CHECK_RESULT;web1;0;PING OK
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultLine(String);

impl ResultLine {
    /// Render a finished check.
    ///
    /// The line plus its newline never exceeds `max_line_size` bytes; the plugin
    /// output is cut on a char boundary when it would.
    pub fn from_check(check: &Check, max_line_size: usize) -> Self {
        let end = check
            .end_time()
            .unwrap_or_else(SystemTime::now)
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let prefix = match check.result_type() {
            ResultType::HostCheck => format!(
                "[{end}] {};{};{};",
                ResultType::HostCheck.command(),
                check.host(),
                check.status().code()
            ),
            ResultType::ServiceCheck => format!(
                "[{end}] {};{};{};{};",
                ResultType::ServiceCheck.command(),
                check.host(),
                check.name(),
                check.status().code()
            ),
        };

        let mut output = check.plugin_output();
        let budget = max_line_size.saturating_sub(prefix.len() + 1);
        if output.len() > budget {
            warn!(
                target: "pcr.deliver.format",
                check = check.name(),
                len = prefix.len() + output.len() + 1,
                max_line_size,
                "result line too long, output truncated"
            );
            truncate_at_boundary(&mut output, budget);
        }

        Self(prefix + &output)
    }

    /// Wrap a line that is already formatted (spooled or externally contributed).
    pub fn from_raw(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Size on the wire, newline included.
    pub fn encoded_len(&self) -> usize {
        self.0.len() + 1
    }

    /// The leading `[epoch]` token, if the line has one.
    pub fn timestamp(&self) -> Option<u64> {
        let (ts, _) = self.0.strip_prefix('[')?.split_once(']')?;
        ts.parse().ok()
    }
}

impl fmt::Display for ResultLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order lines by their leading timestamp; ties fall back to the full line.
pub fn sort_lines(lines: &mut [ResultLine]) {
    lines.sort_by(|a, b| (a.timestamp(), a.as_str()).cmp(&(b.timestamp(), b.as_str())));
}

fn truncate_at_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcr_model::{CheckSpec, StatusCode};

    fn ended(spec: CheckSpec, status: StatusCode, stdout: &str) -> Check {
        let mut c = Check::new(&spec, "web1");
        c.start();
        c.set_status(status);
        c.set_stdout(stdout);
        c.end();
        c
    }

    #[test]
    fn service_line_shape() {
        let c = ended(
            CheckSpec::service("load", "check_load"),
            StatusCode::Warning,
            "WARNING - load 6.0|load1=6.0;5;10",
        );
        let line = ResultLine::from_check(&c, 8192);

        let ts = line.timestamp().expect("timestamp");
        assert_eq!(
            line.as_str(),
            format!("[{ts}] PROCESS_SERVICE_CHECK_RESULT;web1;load;1;WARNING - load 6.0|load1=6.0;5;10")
        );
    }

    #[test]
    fn host_line_shape() {
        let c = ended(
            CheckSpec::host("alive", "check_ping").with_host("gw"),
            StatusCode::Ok,
            "PING OK",
        );
        let line = ResultLine::from_check(&c, 8192);

        let ts = line.timestamp().expect("timestamp");
        assert_eq!(
            line.as_str(),
            format!("[{ts}] PROCESS_HOST_CHECK_RESULT;gw;0;PING OK")
        );
    }

    #[test]
    fn long_output_is_truncated_to_limit() {
        let c = ended(
            CheckSpec::service("big", "cat"),
            StatusCode::Ok,
            &"é".repeat(200),
        );
        let line = ResultLine::from_check(&c, 120);

        assert!(line.encoded_len() <= 120);
        assert!(line.as_str().contains(";big;0;é"));
    }

    #[test]
    fn timestamp_parse() {
        assert_eq!(ResultLine::from_raw("[1700000000] X;h;0;ok").timestamp(), Some(1700000000));
        assert_eq!(ResultLine::from_raw("no stamp").timestamp(), None);
        assert_eq!(ResultLine::from_raw("[abc] x").timestamp(), None);
    }

    #[test]
    fn sort_by_timestamp_then_line() {
        let mut lines = vec![
            ResultLine::from_raw("[1700000005] b"),
            ResultLine::from_raw("[1700000001] z"),
            ResultLine::from_raw("[1700000005] a"),
            ResultLine::from_raw("[999999999] old"),
        ];
        sort_lines(&mut lines);

        let got: Vec<_> = lines.iter().map(|l| l.as_str()).collect();
        assert_eq!(
            got,
            ["[999999999] old", "[1700000001] z", "[1700000005] a", "[1700000005] b"]
        );
    }
}
