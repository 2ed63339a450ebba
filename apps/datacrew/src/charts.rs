use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::protocol::Visualization;

fn file_stem(position: usize, title: &str) -> String {
    let mut slug = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        format!("{:02}-chart", position + 1)
    } else {
        format!("{:02}-{slug}", position + 1)
    }
}

/// Decodes each chart's base64 PNG into `dir`, returning the written paths.
pub async fn save_visualizations(dir: &Path, charts: &[Visualization]) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create chart directory '{}'", dir.display()))?;

    let mut written = Vec::with_capacity(charts.len());
    for (position, chart) in charts.iter().enumerate() {
        let bytes = STANDARD
            .decode(chart.image.trim())
            .with_context(|| format!("chart '{}' has an invalid image payload", chart.title))?;
        let path = dir.join(format!("{}.png", file_stem(position, &chart.title)));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write '{}'", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn chart(title: &str, image: &str) -> Visualization {
        Visualization {
            kind: None,
            title: title.into(),
            description: String::new(),
            image: image.into(),
        }
    }

    #[test]
    fn stems_are_numbered_slugs() {
        assert_eq!(file_stem(0, "Distribution of sales"), "01-distribution-of-sales");
        assert_eq!(file_stem(2, "Count by region (top 10)"), "03-count-by-region-top-10");
        assert_eq!(file_stem(1, "!!!"), "02-chart");
    }

    #[tokio::test]
    async fn writes_decoded_png_bytes() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("datacrew_charts_test_{suffix}"));
        let png = b"\x89PNG\r\n\x1a\nfake";

        let paths = save_visualizations(&dir, &[chart("Correlation Matrix", &STANDARD.encode(png))])
            .await
            .expect("save");

        assert_eq!(paths, vec![dir.join("01-correlation-matrix.png")]);
        assert_eq!(tokio::fs::read(&paths[0]).await.expect("read"), png);
        tokio::fs::remove_dir_all(dir).await.expect("cleanup");
    }

    #[tokio::test]
    async fn invalid_payload_names_the_chart() {
        let dir = std::env::temp_dir().join("datacrew_charts_invalid_test");
        let err = save_visualizations(&dir, &[chart("Broken", "not base64!")])
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("Broken"));
        let _ = tokio::fs::remove_dir_all(dir).await;
    }
}
