//! Job files: one CSV column per category, one product URL per cell

use anyhow::{Context, Result, bail};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::JobSpec;

/// Parse a job table. Empty cells are skipped; `start_offset` applies to every column.
pub fn parse_job_csv<R: Read>(reader: R, start_offset: usize) -> Result<Vec<JobSpec>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let categories: Vec<String> = reader
        .headers()
        .context("Job file has no header row")?
        .iter()
        .map(str::to_string)
        .collect();
    if categories.iter().all(String::is_empty) {
        bail!("Job file header names no category");
    }

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); categories.len()];
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed job row {}", line + 2))?;
        for (column, cell) in record.iter().enumerate().take(categories.len()) {
            if !cell.is_empty() {
                columns[column].push(cell.to_string());
            }
        }
    }

    Ok(categories
        .into_iter()
        .zip(columns)
        .filter(|(category, _)| !category.is_empty())
        .map(|(category, urls)| JobSpec::new(category, urls).with_start_offset(start_offset))
        .collect())
}

pub fn read_job_file(path: &Path, start_offset: usize) -> Result<Vec<JobSpec>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open job file {}", path.display()))?;
    let specs = parse_job_csv(file, start_offset)
        .with_context(|| format!("Failed to parse job file {}", path.display()))?;
    for spec in &specs {
        debug!("Loaded job {} from {}", spec, path.display());
    }
    Ok(specs)
}

/// CSV files directly under `dir`, sorted by name
pub fn list_job_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read job directory {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    info!("Found {} job files in {}", files.len(), dir.display());
    Ok(files)
}

/// Write jobs side by side, one column each; shorter columns are padded with empty cells
pub fn write_job_csv<W: Write>(writer: W, jobs: &[JobSpec]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(jobs.iter().map(|job| job.category.as_str()))?;

    let rows = jobs.iter().map(|job| job.urls.len()).max().unwrap_or(0);
    for row in 0..rows {
        writer.write_record(
            jobs.iter()
                .map(|job| job.urls.get(row).map_or("", String::as_str)),
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_job_file(path: &Path, jobs: &[JobSpec]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create job file {}", path.display()))?;
    write_job_csv(file, jobs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_each_column_is_a_job() {
        let data = "스킨케어,선케어\nhttp://a/1,http://b/1\nhttp://a/2,\nhttp://a/3,\n";
        let jobs = parse_job_csv(data.as_bytes(), 0).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].category, "스킨케어");
        assert_eq!(jobs[0].urls, vec!["http://a/1", "http://a/2", "http://a/3"]);
        assert_eq!(jobs[1].category, "선케어");
        assert_eq!(jobs[1].urls, vec!["http://b/1"]);
    }

    #[test]
    fn test_start_offset_applies_per_column() {
        let data = "클렌징\nu0\nu1\nu2\n";
        let jobs = parse_job_csv(data.as_bytes(), 2).unwrap();
        assert_eq!(jobs[0].start_offset, 2);
        assert_eq!(jobs[0].pending().collect::<Vec<_>>(), vec![(2, "u2")]);
    }

    #[test]
    fn test_missing_header_is_an_error() {
        assert!(parse_job_csv("".as_bytes(), 0).is_err());
    }

    #[test]
    fn test_written_file_reads_back_with_padding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("url").join("all_products_url.csv");
        let jobs = vec![
            JobSpec::new("바디케어", vec!["u1".into(), "u2".into()]),
            JobSpec::new("헤어케어", vec!["h1".into()]),
        ];

        write_job_file(&path, &jobs).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "바디케어,헤어케어\nu1,h1\nu2,\n");
        assert_eq!(read_job_file(&path, 0).unwrap(), jobs);
    }

    #[test]
    fn test_lists_only_csv_files_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["url_2.csv", "url_0.csv", "notes.txt"] {
            fs::write(dir.path().join(name), "c\nu\n").unwrap();
        }
        let files = list_job_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["url_0.csv", "url_2.csv"]);
    }
}
