use crate::cache::SchemeCache;
use crate::derivation::{parse_derivation, run_derivation};
use crate::diagnostics::Diagnostic;
use crate::scheme::QuantifiedScheme;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Runtime options for checking
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// Reuse schemes of unchanged files and record new ones
    pub use_cache: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self { use_cache: true }
    }
}

/// Result of checking one derivation file
#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
    /// Extracted schemes in script order
    pub schemes: Vec<QuantifiedScheme>,
    /// Schemes came from the cache; the script was not run
    pub cached: bool,
}

impl FileReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Derivation file checker
pub struct DerivationChecker {
    cache: Option<SchemeCache>,
}

impl DerivationChecker {
    pub fn new(options: CheckOptions) -> Self {
        let cache = options.use_cache.then(SchemeCache::load_current);
        Self { cache }
    }

    /// Checker backed by the given cache instead of the on-disk one
    pub fn with_cache(cache: SchemeCache) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn cache(&self) -> Option<&SchemeCache> {
        self.cache.as_ref()
    }

    /// Check a derivation given as text
    pub fn check_source(&self, path: &Path, source: &str) -> FileReport {
        if let Some(schemes) = self.cache.as_ref().and_then(|c| c.lookup(path, source)) {
            tracing::debug!(path = %path.display(), "cache hit");
            return FileReport {
                path: path.to_path_buf(),
                diagnostics: Vec::new(),
                schemes: schemes.to_vec(),
                cached: true,
            };
        }

        let derivation = match parse_derivation(source) {
            Ok(derivation) => derivation,
            Err(errors) => {
                return FileReport {
                    path: path.to_path_buf(),
                    diagnostics: errors.iter().map(|e| Diagnostic::parse_error(path, e)).collect(),
                    schemes: Vec::new(),
                    cached: false,
                }
            }
        };

        let report = run_derivation(&derivation);
        let mut diagnostics: Vec<Diagnostic> = report
            .errors
            .iter()
            .map(|e| Diagnostic::run_error(path, e))
            .collect();
        if derivation.extraction_count() == 0 {
            diagnostics.push(Diagnostic::nothing_extracted(path));
        }

        tracing::debug!(
            path = %path.display(),
            steps = derivation.steps.len(),
            diagnostics = diagnostics.len(),
            "derivation checked"
        );

        FileReport {
            path: path.to_path_buf(),
            diagnostics,
            schemes: report.schemes().cloned().collect(),
            cached: false,
        }
    }

    /// Check a single derivation file
    pub fn check_file(&self, file_path: &Path) -> Result<FileReport> {
        Ok(self.check_file_with_source(file_path)?.0)
    }

    fn check_file_with_source(&self, file_path: &Path) -> Result<(FileReport, String)> {
        let source = std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;
        let report = self.check_source(file_path, &source);
        Ok((report, source))
    }

    /// Check `root` (a file, or every `*.deriv` file below a directory) in
    /// parallel. Clean results are recorded in the cache.
    pub fn check_paths(&mut self, root: &Path) -> Result<Vec<FileReport>> {
        let files = collect_derivation_files(root)?;
        tracing::info!(files = files.len(), root = %root.display(), "checking derivations");

        let results: Vec<(FileReport, String)> = files
            .par_iter()
            .map(|path| self.check_file_with_source(path))
            .collect::<Result<_>>()?;

        let mut reports = Vec::with_capacity(results.len());
        for (report, source) in results {
            if let Some(cache) = self.cache.as_mut() {
                if !report.cached && report.diagnostics.is_empty() {
                    cache.insert(report.path.clone(), &source, report.schemes.clone());
                }
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Write the cache back to disk, if caching is enabled
    pub fn save_cache(&self) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.save(),
            None => Ok(()),
        }
    }
}

/// `root` itself if it is a file, otherwise every `*.deriv` file below it
/// in file name order
pub fn collect_derivation_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.exists() {
        anyhow::bail!("Path not found: {}", root.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let is_derivation = entry.path().extension().and_then(|ext| ext.to_str()) == Some("deriv");
        if entry.file_type().is_file() && is_derivation {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
