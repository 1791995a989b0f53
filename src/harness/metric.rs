use crate::error::{HarnessError, Result};
use regex::Regex;
use std::sync::OnceLock;

fn throughput_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^Requests per second:\s*([0-9]+\.[0-9]+)\s*\[#/sec\]\s*\(mean\)\s*$")
            .expect("throughput pattern is valid")
    })
}

/// Pulls the mean requests/second figure out of an ApacheBench-style report.
///
/// Any other lines in `raw` are ignored. If no line matches, the error keeps
/// the complete text so the caller can show what the tool actually printed.
pub fn extract_throughput(raw: &str) -> Result<f64> {
    throughput_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or_else(|| HarnessError::MetricNotFound {
            output: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AB_REPORT: &str = "This is ApacheBench, Version 2.3 <$Revision: 1903618 $>
Benchmarking 127.0.0.1 (be patient)
Completed 100 requests
Finished 1000 requests

Server Software:
Server Hostname:        127.0.0.1
Server Port:            4096

Document Path:          /set
Concurrency Level:      10
Time taken for tests:   0.412 seconds
Complete requests:      1000
Failed requests:        0
Requests per second:    2427.18 [#/sec] (mean)
Time per request:       4.120 [ms] (mean)
Time per request:       0.412 [ms] (mean, across all concurrent requests)
Transfer rate:          225.25 [Kbytes/sec] received
";

    #[test]
    fn test_extracts_from_full_report() {
        assert_eq!(extract_throughput(AB_REPORT).unwrap(), 2427.18);
    }

    #[test]
    fn test_ignores_surrounding_chatter() {
        let chatter = [
            "",
            "warning: something odd\n",
            "Time per request: 1.0 [ms] (mean)\nRequests per second: 9 [#/sec] (mean)\n",
        ];
        for prefix in chatter {
            for suffix in chatter {
                let text =
                    format!("{prefix}Requests per second:    100.5 [#/sec] (mean)\n{suffix}");
                assert_eq!(extract_throughput(&text).unwrap(), 100.5, "text: {text:?}");
            }
        }
    }

    #[test]
    fn test_tolerates_crlf_and_tight_spacing() {
        let text = "Complete requests: 10\r\nRequests per second:42.0[#/sec](mean)\r\nDone\r\n";
        assert_eq!(extract_throughput(text).unwrap(), 42.0);
    }

    #[test]
    fn test_missing_line_carries_raw_text() {
        let text =
            "apr_socket_recv: Connection reset by peer (104)\nTotal of 12 requests completed\n";
        match extract_throughput(text) {
            Err(HarnessError::MetricNotFound { output }) => assert_eq!(output, text),
            other => panic!("expected MetricNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_partial_matches() {
        // integer values and prefixed lines do not satisfy the report contract
        assert!(extract_throughput("Requests per second: 100 [#/sec] (mean)").is_err());
        assert!(extract_throughput("  Requests per second: 1.5 [#/sec] (mean)").is_err());
        assert!(extract_throughput("Requests per second: 1.5 [#/sec]").is_err());
        assert!(extract_throughput("").is_err());
    }
}
