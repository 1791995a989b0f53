use anyhow::{anyhow, bail, Result};
use std::time::Duration;

/// Upper bound on the number of values one sweep list may expand to.
pub const MAX_SWEEP_LEVELS: usize = 10_000;

pub fn parse_duration(duration_str: &str) -> Result<Duration> {
    let s = duration_str.trim();
    if let Some(millis) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(millis.trim().parse()?))
    } else if let Some(minutes) = s.strip_suffix('m') {
        let minutes: u64 = minutes.trim().parse()?;
        let seconds = minutes
            .checked_mul(60)
            .ok_or_else(|| anyhow!("Duration '{}' is too large", duration_str))?;
        Ok(Duration::from_secs(seconds))
    } else if let Some(seconds) = s.strip_suffix('s') {
        Ok(Duration::from_secs(seconds.trim().parse()?))
    } else {
        Ok(Duration::from_secs(s.parse()?))
    }
}

/// Parses sweep lists such as `1,10,20,50` or `1-9,10-100:10`.
///
/// Ranges are inclusive; the optional `:step` defaults to 1. The result keeps
/// the written order, so `10,1` stays descending and is rejected later by
/// sweep validation.
pub fn parse_levels(spec: &str) -> Result<Vec<u32>> {
    let mut levels: Vec<u32> = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (range, step) = match part.split_once(':') {
            Some((range, step)) => (range, step.trim().parse::<u32>()?),
            None => (part, 1),
        };
        if step == 0 {
            bail!("Step must be positive in '{}'", part);
        }

        match range.split_once('-') {
            Some((start, end)) => {
                let start: u32 = start.trim().parse()?;
                let end: u32 = end.trim().parse()?;
                if start > end {
                    bail!("Range start exceeds end in '{}'", part);
                }
                let count = ((end - start) / step) as usize + 1;
                if levels.len() + count > MAX_SWEEP_LEVELS {
                    bail!(
                        "Sweep list '{}' expands to more than {} values",
                        spec,
                        MAX_SWEEP_LEVELS
                    );
                }
                levels.extend((start..=end).step_by(step as usize));
            }
            None => levels.push(
                range
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid sweep value '{}'", part))?,
            ),
        }
    }

    if levels.is_empty() {
        bail!("Sweep list '{}' is empty", spec);
    }
    if levels.len() > MAX_SWEEP_LEVELS {
        bail!(
            "Sweep list '{}' expands to more than {} values",
            spec,
            MAX_SWEEP_LEVELS
        );
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_parse_duration_overflow_is_error() {
        let err = parse_duration(&format!("{}m", u64::MAX)).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_parse_plain_list() {
        assert_eq!(parse_levels("1,10,20,50").unwrap(), vec![1, 10, 20, 50]);
        assert_eq!(parse_levels(" 5 , 10 ").unwrap(), vec![5, 10]);
    }

    #[test]
    fn test_parse_ranges() {
        let levels = parse_levels("1-9,10-100:10").unwrap();
        assert_eq!(levels.len(), 19);
        assert_eq!(&levels[..3], &[1, 2, 3]);
        assert_eq!(levels[8], 9);
        assert_eq!(levels[9], 10);
        assert_eq!(*levels.last().unwrap(), 100);
    }

    #[test]
    fn test_parse_levels_errors() {
        assert!(parse_levels("").is_err());
        assert!(parse_levels("9-1").is_err());
        assert!(parse_levels("1-10:0").is_err());
        assert!(parse_levels("ten").is_err());
    }

    #[test]
    fn test_huge_range_is_rejected() {
        let err = parse_levels("1-4000000000").unwrap_err();
        assert!(err.to_string().contains("more than"));
        assert!(parse_levels("1-4000000000:1000000").is_ok());
        assert_eq!(parse_levels("1-10000").unwrap().len(), MAX_SWEEP_LEVELS);
        assert!(parse_levels("1-10000,20000").is_err());
    }
}
