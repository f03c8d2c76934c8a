//! Device list (Shaper.csv).
//!
//! Expected columns, after a header row:
//! deviceID, ParentNode, mac, hostname, ipv4, ipv6, downloadMin, uploadMin, downloadMax, uploadMax
//!
//! Example:
//! 1,House1,00:11:22:33:44:55,alice-router,100.64.0.2,,10,5,20,10
//!
//! Rates are whole Mbps and are scaled by the configured protocol overhead factor here, so the
//! compiler only ever sees the on-the-wire figures.

use crate::Result;
use crate::model::clamp::checked_mbps;

use anyhow::{Context, bail};
use std::collections::BTreeSet;
use std::fs::File;
use std::io;
use std::net::Ipv4Addr;
use std::path::Path;

/// Parent name given to devices whose ParentNode column is blank.
pub const UNPARENTED: &str = "none";

const COLUMNS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    /// Name of the topology node this device hangs off (resolved during compilation).
    pub parent_node: String,
    pub mac: String,
    pub hostname: String,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<String>,
    pub download_min: u32,
    pub upload_min: u32,
    pub download_max: u32,
    pub upload_max: u32,
}

/// Open and parse a device CSV file.
pub fn load_devices(path: &Path, overhead_factor: f64) -> Result<Vec<Device>> {
    let file =
        File::open(path).with_context(|| format!("read device file {}", path.display()))?;
    parse_devices(file, overhead_factor, &path.display().to_string())
}

/// Parse device records from `reader`; `source` names the input in error messages.
pub fn parse_devices<R: io::Read>(
    reader: R,
    overhead_factor: f64,
    source: &str,
) -> Result<Vec<Device>> {
    if !overhead_factor.is_finite() || overhead_factor <= 0.0 {
        bail!("overhead factor must be positive, got {}", overhead_factor);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    let mut ids = BTreeSet::new();
    for record in rdr.records() {
        let record = record.with_context(|| format!("read device record in {}", source))?;
        let lno = record.position().map(|p| p.line()).unwrap_or_default();

        // Skip blank lines.
        if record.iter().all(str::is_empty) {
            continue;
        }

        if record.len() != COLUMNS {
            bail!(
                "device parse error at {}:{}: expected {} columns, found {}",
                source,
                lno,
                COLUMNS,
                record.len()
            );
        }

        let field = |idx: usize| record.get(idx).unwrap_or_default();
        let rate = |idx: usize, name: &str| -> Result<u32> {
            let raw: u32 = field(idx).parse().with_context(|| {
                format!(
                    "device parse error at {}:{}: {} is not a whole number: {:?}",
                    source,
                    lno,
                    name,
                    field(idx)
                )
            })?;
            match checked_mbps(f64::from(raw) * overhead_factor) {
                Some(scaled) => Ok(scaled),
                None => bail!(
                    "device parse error at {}:{}: {} of {} Mbps is out of range after overhead scaling",
                    source,
                    lno,
                    name,
                    raw
                ),
            }
        };

        let id = field(0).to_string();
        let parent_node = match field(1) {
            "" => UNPARENTED.to_string(),
            p => p.to_string(),
        };
        let ipv4 = match field(4) {
            "" => None,
            ip => Some(ip.parse::<Ipv4Addr>().with_context(|| {
                format!("device parse error at {}:{}: bad ipv4 {:?}", source, lno, ip)
            })?),
        };
        let ipv6 = Some(field(5)).filter(|s| !s.is_empty()).map(str::to_string);

        let device = Device {
            parent_node,
            mac: field(2).to_string(),
            hostname: field(3).to_string(),
            ipv4,
            ipv6,
            download_min: rate(6, "downloadMin")?,
            upload_min: rate(7, "uploadMin")?,
            download_max: rate(8, "downloadMax")?,
            upload_max: rate(9, "uploadMax")?,
            id,
        };

        if !ids.insert(device.id.clone()) {
            tracing::warn!(
                device = %device.id,
                hostname = %device.hostname,
                "duplicate device id at {}:{}",
                source,
                lno
            );
        }
        out.push(device);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "ID,ParentNode,MAC,Hostname,IPv4,IPv6,Download Min,Upload Min,Download Max,Upload Max\n";

    fn parse(body: &str) -> Result<Vec<Device>> {
        parse_devices(format!("{}{}", HEADER, body).as_bytes(), 1.09, "Shaper.csv")
    }

    #[test]
    fn parses_and_scales_rates() {
        let devices =
            parse("1, House1 ,00:11:22:33:44:55,alice,100.64.0.2,fd00::2,10,5,20,10\n").unwrap();
        assert_eq!(
            devices,
            vec![Device {
                id: "1".into(),
                parent_node: "House1".into(),
                mac: "00:11:22:33:44:55".into(),
                hostname: "alice".into(),
                ipv4: Some(Ipv4Addr::new(100, 64, 0, 2)),
                ipv6: Some("fd00::2".into()),
                // round(x * 1.09)
                download_min: 11,
                upload_min: 5,
                download_max: 22,
                upload_max: 11,
            }]
        );
    }

    #[test]
    fn blank_parent_and_addresses() {
        let devices = parse("7,,aa:bb:cc:dd:ee:ff,bob,,,1,1,100,100\n").unwrap();
        assert_eq!(devices[0].parent_node, UNPARENTED);
        assert_eq!(devices[0].ipv4, None);
        assert_eq!(devices[0].ipv6, None);
        assert_eq!(devices[0].download_max, 109);
    }

    #[test]
    fn keeps_file_order() {
        let devices = parse(
            "b,N,m,h2,,,1,1,1,1\n\
             a,N,m,h1,,,1,1,1,1\n",
        )
        .unwrap();
        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn non_numeric_rate_fails_with_location() {
        let err = parse("1,N,m,h,,,ten,1,1,1\n").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Shaper.csv:2"), "{}", msg);
        assert!(msg.contains("downloadMin"), "{}", msg);
    }

    #[test]
    fn rate_overflowing_after_scaling_fails() {
        let err = parse("1,N,m,h,,,1,1,4294967295,1\n").unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("Shaper.csv:2"), "{}", msg);
        assert!(msg.contains("downloadMax"), "{}", msg);
        assert!(msg.contains("out of range"), "{}", msg);
    }

    #[test]
    fn wrong_column_count_fails() {
        let err = parse("1,N,m,h,,,1,1,1\n").unwrap_err();
        assert!(err.to_string().contains("expected 10 columns"));
    }

    #[test]
    fn bad_ipv4_fails() {
        assert!(parse("1,N,m,h,300.1.1.1,,1,1,1,1\n").is_err());
    }

    #[test]
    fn duplicate_ids_are_kept() {
        let devices = parse("1,N,m,h,,,1,1,1,1\n1,N,m,h,,,1,1,1,1\n").unwrap();
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "{}1,N,m,h,10.0.0.1,,100,100,100,100\n", HEADER).unwrap();
        let devices = load_devices(file.path(), 1.0).unwrap();
        assert_eq!(devices[0].download_max, 100);
    }
}
