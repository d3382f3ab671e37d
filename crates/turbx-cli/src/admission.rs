// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Memory admission gate.
//!
//! Before a render starts, [`Admission::admit`] waits until the host reports
//! more available memory than the configured floor. Hosts without
//! `/proc/meminfo` are always admitted.

use std::time::Duration;

const MEMINFO: &str = "/proc/meminfo";

/// Blocks renders while free memory is below a floor.
#[derive(Debug, Clone)]
pub struct Admission {
    floor: u64,
    poll: Duration,
}

/// Reads `MemAvailable` in bytes from meminfo text.
pub fn parse_meminfo(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("MemAvailable:"))?;
    let kb = line
        .trim_start_matches("MemAvailable:")
        .split_whitespace()
        .next()?
        .parse::<u64>()
        .ok()?;
    Some(kb * 1024)
}

impl Admission {
    /// Creates a gate with a floor in MiB. A floor of 0 admits everything.
    pub fn new(floor_mb: u64) -> Self {
        Self {
            floor: floor_mb * 1024 * 1024,
            poll: Duration::from_millis(1),
        }
    }

    /// The floor in bytes.
    pub fn floor(&self) -> u64 {
        self.floor
    }

    /// Available memory in bytes, if the host reports it.
    pub async fn available() -> Option<u64> {
        let text = tokio::fs::read_to_string(MEMINFO).await.ok()?;
        parse_meminfo(&text)
    }

    /// Waits until available memory is above the floor.
    pub async fn admit(&self) {
        if self.floor == 0 {
            return;
        }
        let mut waited = false;
        loop {
            match Self::available().await {
                Some(bytes) if bytes < self.floor => {
                    if !waited {
                        tracing::info!("Low memory ({} bytes available), holding render", bytes);
                        waited = true;
                    }
                    tokio::time::sleep(self.poll).await;
                }
                _ => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meminfo() {
        let text = "MemTotal:       16000000 kB\nMemFree:         1000 kB\nMemAvailable:    2048 kB\n";
        assert_eq!(parse_meminfo(text), Some(2048 * 1024));
        assert_eq!(parse_meminfo("MemTotal: 1 kB\n"), None);
    }

    #[tokio::test]
    async fn test_zero_floor_admits() {
        Admission::new(0).admit().await;
        assert_eq!(Admission::new(10).floor(), 10 * 1024 * 1024);
    }
}
