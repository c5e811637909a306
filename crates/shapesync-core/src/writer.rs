// ── Artifact writer ──
//
// Renders `ShapedDevices.csv` and `network.json` in memory and stages each
// changed one as a fsynced temp file beside its target. Only when both are
// staged are they renamed into place, so a failed write leaves the previous
// pair untouched. Unchanged artifacts are never rewritten, so the shaper
// only reloads when something actually moved.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bandwidth::format_mbps;
use crate::config::ArtifactPaths;
use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::topology::Topology;

/// Shaping-table column order expected by LibreQoS.
pub const SHAPED_DEVICES_HEADER: [&str; 13] = [
    "Circuit ID",
    "Circuit Name",
    "Device ID",
    "Device Name",
    "Parent Node",
    "MAC",
    "IPv4",
    "IPv6",
    "Download Min Mbps",
    "Upload Min Mbps",
    "Download Max Mbps",
    "Upload Max Mbps",
    "Comment",
];

/// Lowest rate LibreQoS accepts for a circuit.
const MIN_SHAPED_MBPS: f64 = 2.0;

/// What a write actually touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub shaped_devices_written: bool,
    pub network_written: bool,
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        self.shaped_devices_written || self.network_written
    }
}

/// Writes both artifacts with the configured rate shaping.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    paths: ArtifactPaths,
    rate_overhead: f64,
    min_rate_ratio: f64,
}

impl ArtifactWriter {
    pub fn new(paths: ArtifactPaths, rate_overhead: f64, min_rate_ratio: f64) -> Self {
        Self {
            paths,
            rate_overhead,
            min_rate_ratio,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Stage both artifacts, then rename the topology and the shaping
    /// table into place.
    ///
    /// Any render, write or fsync error happens before either target is
    /// replaced.
    pub fn write(
        &self,
        records: &[DeviceRecord],
        topology: &Topology,
    ) -> Result<WriteOutcome, CoreError> {
        let csv = self.render_shaped_devices(records)?;
        let network = render_topology(topology)?;

        let staged_network = stage(&self.paths.network, &network)?;
        let staged_csv = stage(&self.paths.shaped_devices, &csv)?;

        let outcome = WriteOutcome {
            shaped_devices_written: staged_csv.is_some(),
            network_written: staged_network.is_some(),
        };
        if let Some(staged) = staged_network {
            staged.persist()?;
        }
        if let Some(staged) = staged_csv {
            staged.persist()?;
        }

        if outcome.changed() {
            info!(
                circuits = records.len(),
                nodes = topology.nodes.len(),
                shaped_devices = outcome.shaped_devices_written,
                network = outcome.network_written,
                "artifacts updated"
            );
        } else {
            debug!("artifacts unchanged, nothing written");
        }
        Ok(outcome)
    }

    /// Render the shaping table, one row per record, ordered by circuit name.
    pub fn render_shaped_devices(&self, records: &[DeviceRecord]) -> Result<Vec<u8>, CoreError> {
        let serialization = |e: csv::Error| CoreError::Serialization {
            artifact: "ShapedDevices.csv".into(),
            message: e.to_string(),
        };

        let mut sorted: Vec<&DeviceRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.circuit_id.cmp(&b.circuit_id));

        let mut out = csv::Writer::from_writer(Vec::new());
        out.write_record(SHAPED_DEVICES_HEADER).map_err(serialization)?;
        for record in sorted {
            let (down_max, up_max, down_min, up_min) = self.rates(record);
            out.write_record([
                short_id("circuit", &record.circuit_id).as_str(),
                record.circuit_id.as_str(),
                short_id("device", &record.circuit_id).as_str(),
                record.display_name.as_str(),
                record.parent_node.as_str(),
                record.mac.as_deref().unwrap_or_default(),
                record.ipv4.as_deref().unwrap_or_default(),
                record.ipv6.as_deref().unwrap_or_default(),
                down_min.as_str(),
                up_min.as_str(),
                down_max.as_str(),
                up_max.as_str(),
                record.comment.as_str(),
            ])
            .map_err(serialization)?;
        }

        out.into_inner().map_err(|e| CoreError::Serialization {
            artifact: "ShapedDevices.csv".into(),
            message: e.to_string(),
        })
    }

    /// `(down_max, up_max, down_min, up_min)` as rendered in the table.
    ///
    /// Router records get the overhead multiplier and integer floors.
    /// Static records keep their curated maxima and explicit minima.
    #[allow(clippy::cast_precision_loss)]
    fn rates(&self, record: &DeviceRecord) -> (String, String, String, String) {
        if record.is_static() {
            let down_min = record.download_min_mbps.map_or_else(
                || static_min(record.download_limit_mbps, self.min_rate_ratio),
                format_mbps,
            );
            let up_min = record.upload_min_mbps.map_or_else(
                || static_min(record.upload_limit_mbps, self.min_rate_ratio),
                format_mbps,
            );
            return (
                format_mbps(record.download_limit_mbps),
                format_mbps(record.upload_limit_mbps),
                down_min,
                up_min,
            );
        }

        let down_max = floor_mbps(record.download_limit_mbps * self.rate_overhead);
        let up_max = floor_mbps(record.upload_limit_mbps * self.rate_overhead);
        (
            down_max.to_string(),
            up_max.to_string(),
            floor_rate(down_max as f64 * self.min_rate_ratio),
            floor_rate(up_max as f64 * self.min_rate_ratio),
        )
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_mbps(value: f64) -> u64 {
    value.floor().max(MIN_SHAPED_MBPS) as u64
}

fn floor_rate(value: f64) -> String {
    floor_mbps(value).to_string()
}

/// Derived minimum for a curated maximum, never above that maximum. A
/// static device without a maximum gets `0`.
fn static_min(max: f64, ratio: f64) -> String {
    format_mbps((max * ratio).floor().max(MIN_SHAPED_MBPS).min(max))
}

/// Stable 8-character id derived from the circuit name.
pub fn short_id(kind: &str, circuit_name: &str) -> String {
    let uuid = Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("shapesync:{kind}:{circuit_name}").as_bytes(),
    );
    let mut id = uuid.simple().to_string();
    id.truncate(8);
    id.to_ascii_uppercase()
}

/// `network.json` bytes: 4-space indent and a trailing newline.
pub fn render_topology(topology: &Topology) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(topology, &mut ser).map_err(|e| CoreError::Serialization {
        artifact: "network.json".into(),
        message: e.to_string(),
    })?;
    buf.push(b'\n');
    Ok(buf)
}

/// A fully written temp file waiting to replace its target.
///
/// Dropping it without [`persist`](Self::persist) removes the temp file.
struct Staged {
    path: PathBuf,
    tmp: NamedTempFile,
}

impl Staged {
    fn persist(self) -> Result<(), CoreError> {
        let Self { path, tmp } = self;
        tmp.persist(&path).map_err(|e| CoreError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        debug!(path = %path.display(), "artifact committed");
        Ok(())
    }
}

/// Write `bytes` to a synced temp file next to `path`. Returns `None` when
/// the file already holds exactly these bytes.
fn stage(path: &Path, bytes: &[u8]) -> Result<Option<Staged>, CoreError> {
    if fs::read(path).is_ok_and(|current| current == bytes) {
        return Ok(None);
    }

    let io = |source: std::io::Error| CoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(target_dir(path)).map_err(io)?;
    tmp.write_all(bytes).map_err(io)?;
    tmp.as_file().sync_all().map_err(io)?;
    copy_permissions(&tmp, path).map_err(io)?;

    Ok(Some(Staged {
        path: path.to_path_buf(),
        tmp,
    }))
}

fn target_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Keep the existing file's mode; new files are world-readable so the
/// shaper can read them regardless of which user runs the sync.
fn copy_permissions(tmp: &NamedTempFile, target: &Path) -> std::io::Result<()> {
    if let Ok(meta) = fs::metadata(target) {
        if meta.is_file() {
            return fs::set_permissions(tmp.path(), meta.permissions());
        }
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::RouterDescriptor;
    use crate::model::Origin;
    use pretty_assertions::assert_eq;

    fn record(id: &str, down: f64, up: f64, origin: Origin) -> DeviceRecord {
        DeviceRecord {
            circuit_id: id.into(),
            display_name: id.into(),
            parent_node: "A".into(),
            mac: Some("AA:BB:CC:DD:EE:FF".into()),
            ipv4: Some("100.64.0.10".into()),
            ipv6: None,
            download_limit_mbps: down,
            upload_limit_mbps: up,
            download_min_mbps: None,
            upload_min_mbps: None,
            comment: "PPP".into(),
            origin,
            router: (origin != Origin::Static).then(|| "A".to_owned()),
        }
    }

    fn writer(dir: &Path) -> ArtifactWriter {
        ArtifactWriter::new(
            ArtifactPaths {
                shaped_devices: dir.join("ShapedDevices.csv"),
                network: dir.join("network.json"),
            },
            1.0,
            0.5,
        )
    }

    #[test]
    fn shaped_devices_rows_are_sorted_with_stable_ids() {
        let dir = tempfile::tempdir().unwrap();
        let csv = writer(dir.path())
            .render_shaped_devices(&[
                record("user2", 25.0, 25.0, Origin::Pppoe),
                record("user1", 10.0, 10.0, Origin::Pppoe),
            ])
            .unwrap();
        let text = String::from_utf8(csv).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], SHAPED_DEVICES_HEADER.join(","));
        let user1 = format!(
            "{},user1,{},user1,A,AA:BB:CC:DD:EE:FF,100.64.0.10,,5,5,10,10,PPP",
            short_id("circuit", "user1"),
            short_id("device", "user1")
        );
        assert_eq!(lines[1], user1);
        assert!(lines[2].contains(",user2,"));
    }

    #[test]
    fn short_ids_are_deterministic_and_distinct() {
        let id = short_id("circuit", "user1");
        assert_eq!(id.len(), 8);
        assert_eq!(id, short_id("circuit", "user1"));
        assert_ne!(id, short_id("device", "user1"));
        assert_eq!(id, id.to_ascii_uppercase());
    }

    #[test]
    fn router_rates_apply_overhead_and_floor() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        w.rate_overhead = 1.15;
        let (down, up, down_min, up_min) = w.rates(&record("u", 10.0, 1.0, Origin::Pppoe));
        assert_eq!((down.as_str(), up.as_str()), ("11", "2"));
        assert_eq!((down_min.as_str(), up_min.as_str()), ("5", "2"));
    }

    #[test]
    fn static_rates_keep_explicit_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = record("Mikrotik-Static-X", 100.0, 50.0, Origin::Static);
        r.download_min_mbps = Some(40.0);
        let (down, up, down_min, up_min) = writer(dir.path()).rates(&r);
        assert_eq!(
            (down.as_str(), up.as_str(), down_min.as_str(), up_min.as_str()),
            ("100", "50", "40", "25")
        );
    }

    #[test]
    fn static_device_without_rates_gets_zero_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let r = record("Mikrotik-Static-Device-1", 0.0, 0.0, Origin::Static);
        let (down, up, down_min, up_min) = writer(dir.path()).rates(&r);
        assert_eq!(
            (down.as_str(), up.as_str(), down_min.as_str(), up_min.as_str()),
            ("0", "0", "0", "0")
        );
    }

    #[test]
    fn derived_static_minimum_never_exceeds_maximum() {
        let dir = tempfile::tempdir().unwrap();
        let r = record("Mikrotik-Static-Cam", 1.5, 3.0, Origin::Static);
        let (_, _, down_min, up_min) = writer(dir.path()).rates(&r);
        assert_eq!((down_min.as_str(), up_min.as_str()), ("1.5", "2"));
    }

    #[test]
    fn topology_renders_with_four_space_indent() {
        let topo = Topology::build(&[RouterDescriptor::new("A", "10.0.0.1")], &[]);
        let text = String::from_utf8(render_topology(&topo).unwrap()).unwrap();
        assert!(text.starts_with("{\n    \"A\": {\n        \"type\": \"site\""));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn second_identical_write_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let records = [record("user1", 10.0, 10.0, Origin::Pppoe)];
        let topo = Topology::build(&[RouterDescriptor::new("A", "10.0.0.1")], &records);

        let first = w.write(&records, &topo).unwrap();
        assert!(first.shaped_devices_written && first.network_written);
        let csv = fs::read(&w.paths().shaped_devices).unwrap();

        let second = w.write(&records, &topo).unwrap();
        assert!(!second.changed());
        assert_eq!(fs::read(&w.paths().shaped_devices).unwrap(), csv);
    }

    #[cfg(unix)]
    #[test]
    fn new_artifacts_are_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        w.write(&[], &Topology::default()).unwrap();
        let mode = fs::metadata(&w.paths().network).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn failed_topology_commit_leaves_table_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        fs::write(&w.paths().shaped_devices, "old").unwrap();
        fs::create_dir(&w.paths().network).unwrap();

        let err = w
            .write(&[record("user1", 10.0, 10.0, Origin::Pppoe)], &Topology::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
        assert_eq!(fs::read_to_string(&w.paths().shaped_devices).unwrap(), "old");

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_table_write_leaves_topology_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let w = ArtifactWriter::new(
            ArtifactPaths {
                shaped_devices: dir.path().join("missing-dir/ShapedDevices.csv"),
                network: dir.path().join("network.json"),
            },
            1.0,
            0.5,
        );
        fs::write(&w.paths().network, "PREVIOUS").unwrap();

        let topo = Topology::build(&[RouterDescriptor::new("A", "10.0.0.1")], &[]);
        let err = w.write(&[], &topo).unwrap_err();

        assert!(matches!(err, CoreError::Io { .. }));
        assert_eq!(fs::read_to_string(&w.paths().network).unwrap(), "PREVIOUS");
        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name != "missing-dir")
            .collect();
        assert_eq!(entries, vec!["network.json".to_owned()]);
    }
}
