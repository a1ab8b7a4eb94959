use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

/// Loose shape of plugin performance data, e.g. `rx_errors=0;;;0;tx_errors=0;;;0;`.
static PERF_DATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".+=[\w\.;=]*").expect("perf data pattern is valid"));

/// Join stdout, stderr and performance data into the plugin output.
///
/// Text after the first `|` must look like performance data; otherwise the pipe
/// and everything after it is dropped so it cannot corrupt the result line.
pub fn compose(name: &str, stdout: &str, stderr: &str, performance_data: &str) -> String {
    let joined = [stdout, stderr, performance_data]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let res = joined.trim();

    let Some((output, perf)) = res.split_once('|') else {
        return res.to_string();
    };

    match PERF_DATA.find(perf) {
        Some(m) => format!("{output}|{}", m.as_str()),
        None => {
            warn!(target: "pcr.exec.check", check = name, output = res, "invalid perf data dropped");
            output.trim_end().to_string()
        }
    }
}
