//! Chart archive (tar+gzip) loading

use flate2::read::GzDecoder;
use std::io::Read;
use tar::Archive;

use crate::chart::{Chart, ChartFile};
use crate::error::{CoreError, Result};

/// Load a chart from a tar+gzip archive
///
/// Helm archives place all files under a top-level directory named after the
/// chart; that first path component is stripped before the files reach the
/// chart loader.
pub fn load_archive<R: Read>(reader: R) -> Result<Chart> {
    let gz = GzDecoder::new(reader);
    let mut archive = Archive::new(gz);

    let mut files = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?;
        let name = path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let Some((_, rel)) = name.split_once('/') else {
            continue;
        };
        if rel.is_empty() {
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        files.push(ChartFile {
            name: rel.to_string(),
            data,
        });
    }

    if files.is_empty() {
        return Err(CoreError::InvalidChart {
            message: "archive contains no chart files".to_string(),
        });
    }

    Chart::from_files(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_load_archive() {
        let data = build_archive(&[
            (
                "test-chart/Chart.yaml",
                "apiVersion: v2\nname: test-chart\nversion: 0.1.0\n",
            ),
            ("test-chart/values.yaml", "data:\n  foo: bar\n"),
            (
                "test-chart/templates/configmap.yaml",
                "kind: ConfigMap\n",
            ),
        ]);

        let chart = load_archive(&data[..]).unwrap();
        assert_eq!(chart.name(), "test-chart");
        assert_eq!(chart.templates.len(), 1);
        assert_eq!(chart.values["data"]["foo"], "bar");
    }

    #[test]
    fn test_load_archive_empty() {
        let data = build_archive(&[]);
        let err = load_archive(&data[..]).unwrap_err();
        assert!(err.to_string().contains("no chart files"));
    }
}
