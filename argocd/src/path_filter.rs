use argodiff_defs::{Application, MANIFEST_PATHS_ANNOTATION};
use glob::{MatchOptions, Pattern};

fn contains_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Lexically normalizes a relative path: drops `.` and empty segments and resolves `..`.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = vec![];
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn join_path(base: &str, rel: &str) -> String {
    clean_path(&format!("{}/{}", base, rel))
}

/// Resolves one annotation entry against the source path. Absolute entries
/// are relative to the repository root.
pub fn resolve_pattern(pattern: &str, source_path: &str) -> String {
    if let Some(absolute) = pattern.strip_prefix('/') {
        return absolute.to_string();
    }
    if pattern == "." {
        return clean_path(source_path);
    }
    join_path(source_path, pattern.strip_prefix("./").unwrap_or(pattern))
}

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn glob_match(pattern: &str, file: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches_with(file, GLOB_OPTIONS),
        Err(e) => {
            log::warn!("Invalid glob pattern {}: {}", pattern, e);
            false
        }
    }
}

fn prefix_match(prefix: &str, file: &str) -> bool {
    let prefix = clean_path(prefix);
    if prefix.is_empty() {
        return true;
    }
    let file = clean_path(file);
    file == prefix || file.starts_with(&format!("{}/", prefix))
}

/// True if any changed file matches any of the resolved patterns.
pub fn match_changed_files(changed_files: &[String], patterns: &[String]) -> bool {
    changed_files.iter().any(|file| {
        let file = file.trim_start_matches('/');
        patterns.iter().any(|pattern| {
            log::trace!("Matching changed file {} to pattern {}", file, pattern);
            if contains_glob(pattern) {
                glob_match(pattern, file)
            } else {
                prefix_match(pattern, file)
            }
        })
    })
}

/// Keeps applications whose manifest-generate-paths annotation matches a changed file.
/// Applications without the annotation, or with a bare "/", are always kept.
pub fn filter_by_path(apps: Vec<Application>, changed_files: &[String]) -> Vec<Application> {
    apps.into_iter()
        .filter(|app| {
            let annotation = match app.annotation(MANIFEST_PATHS_ANNOTATION) {
                Some(value) => value,
                None => return true,
            };
            let trimmed = annotation.trim();
            if trimmed == "/" || trimmed.is_empty() {
                return true;
            }

            let matched = app.get_sources().iter().any(|source| {
                let patterns: Vec<String> = trimmed
                    .split(';')
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty())
                    .map(|p| resolve_pattern(p, &source.path))
                    .collect();
                match_changed_files(changed_files, &patterns)
            });
            if !matched {
                log::debug!(
                    "Filtering application {}: no changed file matches {}",
                    app.name(),
                    annotation
                );
            }
            matched
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use argodiff_defs::ApplicationSource;
    use pretty_assertions::assert_eq;

    fn app_with_annotation(annotation: Option<&str>) -> Application {
        let mut app = Application::default();
        app.metadata.name = "guestbook".to_string();
        app.spec.source = Some(ApplicationSource {
            repo_url: "https://github.com/acme/deployments.git".to_string(),
            target_revision: "HEAD".to_string(),
            path: "apps".to_string(),
            ..Default::default()
        });
        if let Some(value) = annotation {
            app.metadata
                .annotations
                .insert(MANIFEST_PATHS_ANNOTATION.to_string(), value.to_string());
        }
        app
    }

    fn files(list: &[&str]) -> Vec<String> {
        list.iter().map(|f| f.to_string()).collect()
    }

    fn matches(annotation: &str, changed: &[&str]) -> bool {
        filter_by_path(vec![app_with_annotation(Some(annotation))], &files(changed)).len() == 1
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("apps/./web//"), "apps/web");
        assert_eq!(clean_path("apps/web/../api"), "apps/api");
        assert_eq!(clean_path("."), "");
    }

    #[test]
    fn test_resolve_pattern() {
        assert_eq!(resolve_pattern(".", "apps"), "apps");
        assert_eq!(resolve_pattern("./values", "apps"), "apps/values");
        assert_eq!(resolve_pattern("../shared", "apps/web"), "apps/shared");
        assert_eq!(resolve_pattern("/shared/*.yaml", "apps"), "shared/*.yaml");
    }

    #[test]
    fn test_no_annotation_passes_through() {
        let apps = filter_by_path(vec![app_with_annotation(None)], &files(&["doesnt", "matter"]));
        assert_eq!(apps.len(), 1);
        assert!(matches("/", &["unrelated/file.yaml"]));
        assert!(matches(" / ", &["unrelated/file.yaml"]));
    }

    #[test]
    fn test_relative_annotation() {
        assert!(!matches(".", &["not_apps/manifest.yaml", "something/else.yaml"]));
        assert!(matches(".", &["apps/somepath/manifest.yaml", "something/else.yaml"]));
    }

    #[test]
    fn test_absolute_annotation() {
        assert!(!matches("/apps", &["not_apps/manifest.yaml", "something/else.yaml"]));
        assert!(matches("/apps", &["apps/somepath/manifest.yaml"]));
        assert!(matches("/apps", &["/apps/leading-slash.yaml"]));
    }

    #[test]
    fn test_prefix_is_directory_boundary() {
        assert!(!matches("/apps", &["apps2/manifest.yaml"]));
    }

    #[test]
    fn test_glob_annotation() {
        let pattern = "/shared/application-*.yaml";
        assert!(!matches(pattern, &["somepath/application-testing.yaml"]));
        assert!(matches(pattern, &["shared/application-testing_123.yaml"]));
        // Single segment only
        assert!(!matches(pattern, &["shared/application-x/nested.yaml"]));
    }

    #[test]
    fn test_mixed_annotation() {
        let pattern = ".;/shared/application-*.yaml;/more/apps/";
        assert!(!matches(
            pattern,
            &["somepath/application-testing.yaml", "something/else.yaml", "more/notapps/manifest.yaml"]
        ));
        assert!(matches(pattern, &["shared/application-testing.yaml"]));
        assert!(matches(pattern, &["apps/manifest.yaml"]));
        assert!(matches(pattern, &["more/apps/manifest.yaml"]));
    }

    #[test]
    fn test_any_source_matches() {
        let mut app = app_with_annotation(Some("."));
        app.spec.sources = vec![
            ApplicationSource {
                path: "charts/web".to_string(),
                ..Default::default()
            },
            ApplicationSource {
                path: "values/web".to_string(),
                ..Default::default()
            },
        ];
        let kept = filter_by_path(vec![app], &files(&["values/web/prod.yaml"]));
        assert_eq!(kept.len(), 1);
    }
}
